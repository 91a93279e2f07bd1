//! Path-configuration profile.
//!
//! A `PathConfig` is an immutable, named bundle describing how one kind of
//! path is printed: its target speed, extrusion width, the comment tag
//! emitted for it, and whether it is a closed loop / spiralized. Configs are
//! compared by *identity*, not by field equality: two configs with
//! identical fields but different roles must never fold into the same
//! record. We model that the way `crate::ConfigRef`'s doc comment explains:
//! an `Rc` whose pointer identity is the comparison key, the same way a
//! systems implementation would compare indices into a per-layer config
//! table.

use std::rc::Rc;

/// Reserved comment tag used for the planner's own travel config.
pub const TAG_TRAVEL: &str = "travel";
/// Reserved comment tag excluded from minimum-layer-time slowdown.
pub const TAG_BRIDGE: &str = "BRIDGE";
/// Reserved comment tag eligible for perimeter overlap trim.
pub const TAG_WALL_OUTER: &str = "WALL-OUTER";
/// Reserved comment tag eligible for perimeter overlap trim.
pub const TAG_WALL_INNER: &str = "WALL-INNER";

/// Immutable path configuration. Construct once per (role, material, layer)
/// combination and share it by `ConfigRef` everywhere that role's paths are
/// queued.
#[derive(Debug, Clone, PartialEq)]
pub struct PathConfig {
    pub speed_mm_s: f64,
    pub line_width_um: i64,
    pub comment_tag: String,
    pub closed_loop: bool,
    pub spiralize: bool,
}

impl PathConfig {
    pub fn new(
        speed_mm_s: f64,
        line_width_um: i64,
        comment_tag: impl Into<String>,
        closed_loop: bool,
        spiralize: bool,
    ) -> Self {
        Self {
            speed_mm_s,
            line_width_um,
            comment_tag: comment_tag.into(),
            closed_loop,
            spiralize,
        }
    }

    /// The travel config the planner uses for its own travel moves:
    /// zero-width, open, non-spiralized, tagged `"travel"`.
    pub fn travel(speed_mm_s: f64) -> Self {
        Self::new(speed_mm_s, 0, TAG_TRAVEL, false, false)
    }

    pub fn is_travel(&self) -> bool {
        self.line_width_um == 0
    }

    pub fn is_bridge(&self) -> bool {
        self.comment_tag == TAG_BRIDGE
    }

    pub fn is_perimeter(&self) -> bool {
        self.comment_tag == TAG_WALL_OUTER || self.comment_tag == TAG_WALL_INNER
    }
}

/// A reference-counted handle to a `PathConfig` whose equality is pointer
/// identity: two `ConfigRef`s compare equal iff they wrap the same
/// allocation, regardless of field contents. This is what makes "same
/// config continues the current record" work.
#[derive(Debug, Clone)]
pub struct ConfigRef(Rc<PathConfig>);

impl ConfigRef {
    pub fn new(config: PathConfig) -> Self {
        Self(Rc::new(config))
    }
}

impl PartialEq for ConfigRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for ConfigRef {}

impl std::ops::Deref for ConfigRef {
    type Target = PathConfig;
    fn deref(&self) -> &PathConfig {
        &self.0
    }
}

impl From<PathConfig> for ConfigRef {
    fn from(config: PathConfig) -> Self {
        ConfigRef::new(config)
    }
}
