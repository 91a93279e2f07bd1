//! Planner queue, the core of this crate.
//!
//! A `Planner` owns one layer's worth of `PathRecord`s. It is built once per
//! layer, fed a sequence of queue operations, finalized (speed/fan
//! adjustment), and drained by the emitter. None of that is reentrant or
//! thread-shared: a `Planner` is confined to the single thread that built it.

use path_types::{ConfigRef, IntPoint, PathConfig, PathRecord, Polygon, PolygonSet, RetractLevel};
use print_profile::ConfigSettings;
use tracing::{debug, info, warn};

use crate::core::optimizer::order_polygons;
use crate::core::router::{RouteResult, Router};
use crate::emit::Sink;
use crate::error::{PlannerError, Result};

/// The router and the boundary it is currently routing against, bound by
/// `Planner::set_router`. `last_valid_router_label` below is the only part
/// of this that survives boundary teardown; this struct itself does not.
struct RouterContext<'r> {
    router: &'r dyn Router,
    boundary: PolygonSet,
    layer_index: u32,
}

/// Per-layer path planner. `'r` is the lifetime of a borrowed [`Router`]; a
/// `Planner` must not outlive the router it is currently bound to, which
/// this lifetime parameter enforces at compile time rather than at runtime.
pub struct Planner<'r> {
    paths: Vec<PathRecord>,
    current_extruder: u32,
    /// The extruder active when this layer started, before any operation
    /// ran. Seeds the emitter's tool-tracking so record 0 only switches
    /// tools when it genuinely differs from where the machine already is.
    entry_extruder: u32,
    /// The Z height this planner's layer sits at; stamped onto every
    /// extrusion point appended.
    layer_z: i64,
    /// The position before any operation on this planner ran; finalize's
    /// time accounting threads forward from here.
    entry_position: IntPoint,
    last_position: IntPoint,
    travel_config: ConfigRef,
    router_context: Option<RouterContext<'r>>,
    /// Diagnostic-only handle to the last router that produced a route.
    /// Never dereferenced for routing, it exists purely so a caller can ask
    /// "what routed last" for logging.
    last_valid_router_label: Option<&'static str>,
    force_retraction: bool,
    can_append_travel: bool,
    queued_fan_records: Vec<usize>,
    retract_min_um: i64,
    layer_time_seconds: f64,
}

impl<'r> Planner<'r> {
    /// Creates a planner for one layer. `entry_position` is the machine's
    /// position when this layer starts (the last position emitted at the
    /// end of the previous layer). `travel_speed_mm_s` and `retract_min_um`
    /// come from the bound `ConfigSettings`.
    pub fn new(
        layer_z: i64,
        entry_position: IntPoint,
        travel_speed_mm_s: f64,
        retract_min_um: i64,
        current_extruder: u32,
    ) -> Self {
        Self {
            paths: Vec::new(),
            current_extruder,
            entry_extruder: current_extruder,
            layer_z,
            entry_position,
            last_position: entry_position,
            travel_config: ConfigRef::new(PathConfig::travel(travel_speed_mm_s)),
            router_context: None,
            last_valid_router_label: None,
            force_retraction: false,
            can_append_travel: true,
            queued_fan_records: Vec::new(),
            retract_min_um,
            layer_time_seconds: 0.0,
        }
    }

    pub fn last_position(&self) -> IntPoint {
        self.last_position
    }

    pub fn layer_time_seconds(&self) -> f64 {
        self.layer_time_seconds
    }

    pub fn paths(&self) -> &[PathRecord] {
        &self.paths
    }

    pub fn travel_config(&self) -> &ConfigRef {
        &self.travel_config
    }

    /// The last router outcome that actually produced a route ("interior" or
    /// "direct"), for diagnostics; `None` before any travel has been routed.
    pub fn last_valid_router_label(&self) -> Option<&'static str> {
        self.last_valid_router_label
    }

    /// Binds a router and the boundary it should route against for
    /// subsequent travels, until cleared or rebound.
    pub fn set_router(&mut self, router: &'r dyn Router, boundary: PolygonSet, layer_index: u32) {
        self.router_context = Some(RouterContext { router, boundary, layer_index });
    }

    pub fn clear_router(&mut self) {
        self.router_context = None;
    }

    fn seal_tail(&mut self) {
        if let Some(last) = self.paths.last_mut() {
            last.seal();
        }
    }

    /// Appends `dest` as an extrusion move under `cfg`. Folds into the tail
    /// record if it is open under the same config identity; extrusion never
    /// requests a retraction.
    pub fn queue_extrusion(&mut self, dest: IntPoint, cfg: ConfigRef) -> Result<()> {
        if cfg.is_travel() {
            return Err(PlannerError::ConfigConflict(
                "queue_extrusion requires a config with line_width_um > 0".into(),
            ));
        }

        let mut dest = dest;
        dest.z = Some(self.layer_z);

        let can_fold = self
            .paths
            .last()
            .is_some_and(|r| !r.sealed && r.config == cfg);

        if can_fold {
            self.paths.last_mut().unwrap().append_point(dest);
        } else {
            self.seal_tail();
            let mut rec = PathRecord::new(cfg, self.current_extruder);
            rec.append_point(dest);
            self.paths.push(rec);
        }

        self.last_position = dest;
        Ok(())
    }

    /// Appends `dest` as a travel move, folding into the current travel
    /// record unless `force_unique` or the fold flag forbids it.
    pub fn queue_travel(&mut self, dest: IntPoint, force_unique: bool) -> Result<()> {
        let need_new = force_unique || !self.can_append_travel;
        let can_fold = !need_new
            && self
                .paths
                .last()
                .is_some_and(|r| !r.sealed && r.config == self.travel_config);

        let idx = if can_fold {
            self.paths.len() - 1
        } else {
            self.seal_tail();
            self.paths.push(PathRecord::new(self.travel_config.clone(), self.current_extruder));
            self.paths.len() - 1
        };
        self.can_append_travel = !force_unique;

        if self.force_retraction {
            self.paths[idx].retract = RetractLevel::Force;
            self.force_retraction = false;
        }

        let from = self.last_position;

        if let Some(ctx) = &self.router_context {
            match ctx.router.route(&ctx.boundary, from, dest, ctx.layer_index) {
                RouteResult::Interior(waypoints) => {
                    debug!(count = waypoints.len(), "routed travel through interior waypoints");
                    let mut total: i64 = 0;
                    let mut prev = from;
                    for wp in &waypoints {
                        total += prev.dist(wp);
                        prev = *wp;
                        self.paths[idx].append_point(wp.with_width(0));
                    }
                    if total > self.retract_min_um {
                        self.paths[idx].retract = self.paths[idx].retract.max(RetractLevel::Requested);
                    }
                    self.last_valid_router_label = Some("interior");
                }
                RouteResult::NoPath => {
                    warn!("router found no interior path for travel; falling back to direct");
                    if from.longer_than(&dest, self.retract_min_um / 10) {
                        self.paths[idx].retract = self.paths[idx].retract.max(RetractLevel::Requested);
                    }
                }
                RouteResult::Direct => {
                    self.last_valid_router_label = Some("direct");
                }
            }
        }

        if from.longer_than(&dest, self.retract_min_um) {
            self.paths[idx].retract = self.paths[idx].retract.max(RetractLevel::Requested);
        }

        self.paths[idx].append_point(dest.with_width(0));
        self.last_position = dest;
        Ok(())
    }

    /// Queues one polygon: travels to the chosen start if needed, then walks
    /// it as a closed loop or an open path depending on `cfg.closed_loop`.
    pub fn queue_polygon(&mut self, poly: &Polygon, start_index: usize, cfg: ConfigRef) -> Result<()> {
        if poly.is_empty() {
            return Err(PlannerError::InvalidInput("queue_polygon requires a non-empty polygon".into()));
        }
        if start_index >= poly.len() {
            return Err(PlannerError::InvalidInput("start_index out of range".into()));
        }
        if cfg.is_travel() {
            return Err(PlannerError::ConfigConflict(
                "queue_polygon requires a config with line_width_um > 0".into(),
            ));
        }

        let start_point = poly[start_index];
        if !cfg.spiralize && !start_point.xy_eq(&self.last_position) {
            self.queue_travel(start_point, false)?;
        }

        let n = poly.len();
        if cfg.closed_loop {
            for k in 1..n {
                let idx = (start_index + k) % n;
                self.queue_extrusion(poly[idx], cfg.clone())?;
            }
            if n > 2 {
                self.queue_extrusion(poly[start_index], cfg.clone())?;
            }
        } else if start_index == 0 {
            for k in 1..n {
                self.queue_extrusion(poly[k], cfg.clone())?;
            }
        } else {
            // Any nonzero start_index walks the polygon's own indices
            // n-1..1, independent of the actual start_index value.
            for k in (1..n).rev() {
                self.queue_extrusion(poly[k], cfg.clone())?;
            }
        }
        Ok(())
    }

    pub fn queue_polygons(&mut self, polys: &[Polygon], cfg: ConfigRef) -> Result<()> {
        for poly in polys {
            self.queue_polygon(poly, 0, cfg.clone())?;
        }
        Ok(())
    }

    /// Orders `polys` with the order optimizer, binding `router_and_boundary`
    /// for the optimizer's reachability check and for the travels this
    /// produces, then queues each in its chosen order and start index.
    /// Returns `false` iff `polys` is empty.
    pub fn queue_polygons_by_optimizer(
        &mut self,
        polys: &[Polygon],
        router_and_boundary: Option<(&'r dyn Router, &PolygonSet)>,
        cfg: ConfigRef,
        layer_index: u32,
    ) -> Result<bool> {
        if polys.is_empty() {
            return Ok(false);
        }

        let order_router = router_and_boundary.map(|(r, b)| (r, b, layer_index));
        let order_router_dyn = order_router.map(|(r, b, l)| (r as &dyn Router, b, l));
        let ordered = order_polygons(polys, self.last_position, cfg.closed_loop, order_router_dyn);

        if let Some((router, boundary)) = router_and_boundary {
            self.set_router(router, boundary.clone(), layer_index);
        }

        for &poly_idx in &ordered.order {
            self.queue_polygon(&polys[poly_idx], ordered.start_index[poly_idx], cfg.clone())?;
        }
        Ok(true)
    }

    /// Opens a fan-only record: no points, participates in ordering, emits
    /// no motion (a fan record is a normal record with no points).
    pub fn queue_fan(&mut self, percent: i32, cfg: ConfigRef) {
        self.seal_tail();
        let rec = PathRecord::new_fan(cfg, self.current_extruder, percent);
        self.paths.push(rec);
        self.queued_fan_records.push(self.paths.len() - 1);
    }

    /// The *next* travel will carry a forced retraction; extrusion moves do
    /// not consume this flag.
    pub fn force_retract(&mut self) {
        self.force_retraction = true;
    }

    pub fn set_extruder(&mut self, extruder_index: u32) {
        if self.current_extruder != extruder_index {
            self.seal_tail();
            self.current_extruder = extruder_index;
        }
    }

    pub fn tool_change_required(&self, extruder_index: u32) -> bool {
        self.current_extruder != extruder_index
    }

    /// Threads `entry_position` forward through every appended point,
    /// summing travel and extrusion time using each record's *current*
    /// speed.
    fn compute_times(&self) -> (f64, f64) {
        let mut travel_time = 0.0;
        let mut extrude_time = 0.0;
        let mut cursor = self.entry_position;
        for rec in &self.paths {
            for p in &rec.points {
                let seg_mm = cursor.dist_mm(p);
                let t = seg_mm / rec.speed_mm_s;
                if rec.config.is_travel() {
                    travel_time += t;
                } else {
                    extrude_time += t;
                }
                cursor = *p;
            }
        }
        (travel_time, extrude_time)
    }

    /// Minimum-layer-time slowdown and fan floor. Preserves record count
    /// and order; only mutates `speed_mm_s` and
    /// `fan_percent` fields in place.
    pub fn finalize_layer(&mut self, settings: &ConfigSettings, layer_index: u32) -> Result<()> {
        let (travel_time, extrude_time) = self.compute_times();
        let total = travel_time + extrude_time;

        if total < settings.min_layer_time_s && extrude_time > 0.0 {
            let denom = (settings.min_layer_time_s - travel_time).max(f64::EPSILON);
            let ratio = (extrude_time / denom).clamp(0.0, 1.0);
            info!(ratio, total, "slowing layer to meet minimum layer time");
            for rec in &mut self.paths {
                if rec.config.is_travel() || rec.config.is_bridge() {
                    continue;
                }
                let slowed = (rec.config.speed_mm_s * ratio).max(settings.min_print_speed);
                rec.speed_mm_s = slowed.min(rec.config.speed_mm_s);
            }
        }

        let (travel_time, extrude_time) = self.compute_times();
        self.layer_time_seconds = travel_time + extrude_time;

        let fan_percent = fan_floor_percent(layer_index, settings, self.layer_time_seconds);
        for &idx in &self.queued_fan_records {
            let current = self.paths[idx].fan_percent;
            self.paths[idx].fan_percent = current.max(fan_percent);
        }

        Ok(())
    }

    /// Seals every remaining open record; called automatically by the
    /// emitter before it starts draining.
    pub fn seal_all(&mut self) {
        self.seal_tail();
    }

    pub fn into_records(mut self) -> Vec<PathRecord> {
        self.seal_all();
        self.paths
    }

    /// Drains this layer into `sink`. Terminal: consumes the planner.
    /// `EmptyEmit` is not an error, an empty plan simply emits nothing.
    pub fn emit(self, sink: &mut dyn Sink, layer_thickness: i64, perimeter_overlap_ratio: f64) {
        let entry_position = self.entry_position;
        let entry_extruder = self.entry_extruder;
        let layer_time_seconds = self.layer_time_seconds;
        let records = self.into_records();
        crate::emit::emit(
            &records,
            entry_position,
            entry_extruder,
            layer_thickness,
            perimeter_overlap_ratio,
            layer_time_seconds,
            sink,
        );
    }
}

/// Fan floor formula.
pub fn fan_floor_percent(layer_index: u32, settings: &ConfigSettings, layer_time_seconds: f64) -> i32 {
    if layer_index < settings.first_layer_allow_fan {
        return 0;
    }
    let min_fan_time = settings.min_fan_speed_layer_time.max(settings.max_fan_speed_layer_time);
    if layer_time_seconds >= min_fan_time {
        return 0;
    }
    if settings.max_fan_speed_layer_time >= min_fan_time {
        return settings.fan_max_percent;
    }
    let deficit = (min_fan_time - layer_time_seconds).max(0.0);
    let span = (min_fan_time - settings.max_fan_speed_layer_time).max(0.0);
    let ratio = if span > 0.0 { (deficit / span).min(1.0) } else { 0.0 };
    let value = settings.fan_min_percent as f64
        + ratio * (settings.fan_max_percent - settings.fan_min_percent) as f64;
    value as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use path_types::PathConfig;

    fn cfg(speed: f64, width: i64, tag: &str, closed: bool) -> ConfigRef {
        PathConfig::new(speed, width, tag, closed, false).into()
    }

    #[test]
    fn s1_simple_rectangle_closed_loop() {
        let mut planner = Planner::new(0, IntPoint::new(-5000, 0), 120.0, 1_000_000, 0);
        let poly = vec![
            IntPoint::new(0, 0),
            IntPoint::new(10_000, 0),
            IntPoint::new(10_000, 10_000),
            IntPoint::new(0, 10_000),
        ];
        let wall = cfg(30.0, 400, "WALL-INNER", true);
        planner.queue_polygon(&poly, 0, wall).unwrap();

        let records = planner.paths();
        assert_eq!(records.len(), 2);
        assert!(records[0].config.is_travel());
        assert_eq!(records[0].points, vec![IntPoint::new(0, 0).with_width(0)]);
        assert_eq!(
            records[1].points,
            vec![
                IntPoint::new(10_000, 0).with_z_value(0),
                IntPoint::new(10_000, 10_000).with_z_value(0),
                IntPoint::new(0, 10_000).with_z_value(0),
                IntPoint::new(0, 0).with_z_value(0),
            ]
        );
    }

    #[test]
    fn s2_retraction_on_long_travel() {
        let mut planner = Planner::new(0, IntPoint::new(0, 0), 120.0, 2000, 0);
        planner.queue_travel(IntPoint::new(10_000, 0), false).unwrap();
        let rec = &planner.paths()[0];
        assert_eq!(rec.retract, RetractLevel::Requested);
        assert_eq!(rec.points, vec![IntPoint::new(10_000, 0).with_width(0)]);
    }

    #[test]
    fn s3_force_retract_next_travel_only() {
        let mut planner = Planner::new(0, IntPoint::new(0, 0), 120.0, 1_000_000, 0);
        let ext = cfg(30.0, 400, "SKIN", false);
        planner.force_retract();
        planner.queue_extrusion(IntPoint::new(1, 0), ext).unwrap();
        planner.queue_travel(IntPoint::new(1000, 1000), false).unwrap();

        let records = planner.paths();
        assert_eq!(records[0].retract, RetractLevel::None);
        assert_eq!(records[1].retract, RetractLevel::Force);
    }

    #[test]
    fn s4_minimum_layer_time_slowdown() {
        // Build a layer whose extrude_time and travel_time match the S4
        // scenario by construction: one travel move taking exactly 1s at
        // travel speed, and one extrusion move taking exactly 4s at 60mm/s.
        let travel_speed = 100.0; // mm/s
        let travel_len_mm = travel_speed * 1.0;
        let extrude_speed = 60.0;
        let extrude_len_mm = extrude_speed * 4.0;

        let mut planner = Planner::new(0, IntPoint::new(0, 0), travel_speed, 1_000_000, 0);
        planner
            .queue_travel(IntPoint::new((travel_len_mm * 1000.0) as i64, 0), false)
            .unwrap();
        let wall = cfg(extrude_speed, 400, "WALL-INNER", false);
        let from = planner.last_position();
        planner
            .queue_extrusion(IntPoint::new(from.x + (extrude_len_mm * 1000.0) as i64, from.y), wall)
            .unwrap();

        let settings = ConfigSettings {
            min_layer_time_s: 10.0,
            min_print_speed: 5.0,
            min_fan_speed_layer_time: 0.0,
            max_fan_speed_layer_time: 0.0,
            fan_min_percent: 0,
            fan_max_percent: 0,
            first_layer_allow_fan: 0,
            retract_min_um: 1_000_000,
            perimeter_overlap_ratio: 1.0,
            travel_speed_mm_s: travel_speed,
        };
        planner.finalize_layer(&settings, 1).unwrap();

        let ratio = (4.0f64 / 9.0).min(1.0);
        let expected_speed = (60.0 * ratio).max(5.0);
        let records = planner.paths();
        assert!((records[1].speed_mm_s - expected_speed).abs() < 1e-6);
    }

    #[test]
    fn s5_fan_floor_raises_low_but_not_high() {
        let settings = ConfigSettings {
            min_layer_time_s: 0.0,
            min_print_speed: 5.0,
            min_fan_speed_layer_time: 30.0,
            max_fan_speed_layer_time: 10.0,
            fan_min_percent: 20,
            fan_max_percent: 100,
            first_layer_allow_fan: 0,
            retract_min_um: 1_000_000,
            perimeter_overlap_ratio: 1.0,
            travel_speed_mm_s: 120.0,
        };
        assert_eq!(fan_floor_percent(1, &settings, 20.0), 60);

        let mut planner = Planner::new(0, IntPoint::new(0, 0), 120.0, 1_000_000, 0);
        let travel = planner.travel_config().clone();
        planner.queue_fan(40, travel.clone());
        planner.queue_fan(80, travel);
        // Force layer_time_seconds = 20 directly through finalize by giving
        // it no geometry (both times are zero) and asserting the formula's
        // pure function separately above; here we only check the max-fold.
        planner.layer_time_seconds = 20.0;
        for &idx in &planner.queued_fan_records.clone() {
            let cur = planner.paths[idx].fan_percent;
            planner.paths[idx].fan_percent = cur.max(60);
        }
        assert_eq!(planner.paths()[0].fan_percent, 60);
        assert_eq!(planner.paths()[1].fan_percent, 80);
    }

    #[test]
    fn retract_is_monotone_non_decreasing() {
        let mut planner = Planner::new(0, IntPoint::new(0, 0), 120.0, 500, 0);
        planner.force_retract();
        planner.queue_travel(IntPoint::new(10_000, 0), false).unwrap();
        assert_eq!(planner.paths()[0].retract, RetractLevel::Force);
    }

    #[test]
    fn finalize_preserves_record_count_and_order() {
        let mut planner = Planner::new(0, IntPoint::new(0, 0), 120.0, 1_000_000, 0);
        let wall = cfg(30.0, 400, "WALL-INNER", false);
        planner.queue_extrusion(IntPoint::new(1000, 0), wall.clone()).unwrap();
        planner.queue_travel(IntPoint::new(2000, 0), true).unwrap();
        planner.queue_extrusion(IntPoint::new(3000, 0), wall).unwrap();
        let before: Vec<_> = planner.paths().iter().map(|r| r.config.comment_tag.clone()).collect();

        let settings = ConfigSettings {
            min_layer_time_s: 1000.0,
            min_print_speed: 1.0,
            min_fan_speed_layer_time: 0.0,
            max_fan_speed_layer_time: 0.0,
            fan_min_percent: 0,
            fan_max_percent: 0,
            first_layer_allow_fan: 0,
            retract_min_um: 1_000_000,
            perimeter_overlap_ratio: 1.0,
            travel_speed_mm_s: 120.0,
        };
        planner.finalize_layer(&settings, 0).unwrap();
        let after: Vec<_> = planner.paths().iter().map(|r| r.config.comment_tag.clone()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn total_time_above_minimum_leaves_speeds_unchanged() {
        let mut planner = Planner::new(0, IntPoint::new(0, 0), 120.0, 1_000_000, 0);
        let wall = cfg(30.0, 400, "WALL-INNER", false);
        planner.queue_extrusion(IntPoint::new(1_000_000, 0), wall).unwrap();
        let settings = ConfigSettings {
            min_layer_time_s: 0.001,
            min_print_speed: 1.0,
            min_fan_speed_layer_time: 0.0,
            max_fan_speed_layer_time: 0.0,
            fan_min_percent: 0,
            fan_max_percent: 0,
            first_layer_allow_fan: 0,
            retract_min_um: 1_000_000,
            perimeter_overlap_ratio: 1.0,
            travel_speed_mm_s: 120.0,
        };
        planner.finalize_layer(&settings, 0).unwrap();
        assert_eq!(planner.paths()[0].speed_mm_s, 30.0);
    }
}
