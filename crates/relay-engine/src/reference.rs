use std::collections::BTreeMap;

use glam::{Quat, Vec3};
use relay_core::{
    ActivationState, BodyType, ConstraintKind, ConstraintOptions, DebugLine, Pose, ShapeDesc,
};
use tracing::{debug, trace};

use crate::config::WorldConfig;
use crate::engine::{
    BodyDesc, BodyHandle, ConstraintHandle, ContactManifold, ContactPoint, PhysicsEngine,
    ShapeHandle, Velocity,
};
use crate::error::{EngineError, EngineResult};
use crate::narrowphase::{self, Proxy};

/// Seconds a body must stay under both sleeping thresholds before it sleeps.
const SLEEP_DELAY: f32 = 2.0;
/// Contacts are reported up to this separation.
const CONTACT_MARGIN: f32 = 0.02;

#[derive(Debug, Clone)]
struct RigidBody {
    body_type: BodyType,
    pose: Pose,
    previous: Pose,
    velocity: Velocity,
    mass: f32,
    gravity: Vec3,
    linear_damping: f32,
    angular_damping: f32,
    linear_threshold: f32,
    angular_threshold: f32,
    angular_factor: Vec3,
    activation: ActivationState,
    idle_time: f32,
    no_response: bool,
    group: u32,
    mask: u32,
    shapes: BTreeMap<ShapeHandle, ShapeDesc>,
}

impl RigidBody {
    fn inverse_mass(&self) -> f32 {
        if self.body_type == BodyType::Dynamic && self.mass > 0.0 {
            1.0 / self.mass
        } else {
            0.0
        }
    }

    fn is_dynamic(&self) -> bool {
        self.body_type == BodyType::Dynamic
    }

    /// Integrated this sub-step.
    fn is_simulated(&self) -> bool {
        self.is_dynamic() && self.activation.is_awake()
    }

    fn accepts(&self, other: &Self) -> bool {
        (self.group & other.mask) != 0 && (other.group & self.mask) != 0
    }

    fn proxies(&self) -> impl Iterator<Item = Proxy> + '_ {
        self.shapes
            .values()
            .map(move |shape| Proxy::new(&self.pose, shape))
    }
}

#[derive(Debug, Clone)]
struct Joint {
    body: BodyHandle,
    target: BodyHandle,
    options: ConstraintOptions,
    /// Target pose in the body's frame at creation time.
    relative: Pose,
    rest_length: f32,
}

/// Position-based rigid-body engine with fixed sub-steps.
///
/// Each sub-step integrates awake dynamic bodies, detects contacts between
/// bounding proxies, projects contacts and joints for `solver_iterations`
/// passes, and derives velocities from the corrected positions. Bodies are
/// kept in handle order so runs are deterministic.
#[derive(Debug)]
pub struct ReferenceEngine {
    config: WorldConfig,
    bodies: BTreeMap<BodyHandle, RigidBody>,
    joints: BTreeMap<ConstraintHandle, Joint>,
    manifolds: Vec<ContactManifold>,
    accumulator: f32,
    next_handle: u32,
    torn_down: bool,
}

impl ReferenceEngine {
    /// Build an engine, rejecting unusable configs.
    pub fn new(config: WorldConfig) -> EngineResult<Self> {
        config.validate()?;
        debug!(
            gravity = ?config.gravity,
            fixed_time_step = config.fixed_time_step,
            max_sub_steps = config.max_sub_steps,
            "reference engine created"
        );
        Ok(Self {
            config,
            bodies: BTreeMap::new(),
            joints: BTreeMap::new(),
            manifolds: Vec::new(),
            accumulator: 0.0,
            next_handle: 0,
            torn_down: false,
        })
    }

    /// The config this engine runs with.
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Number of live bodies.
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Number of live constraints.
    pub fn constraint_count(&self) -> usize {
        self.joints.len()
    }

    /// Number of shapes attached to a body.
    pub fn shape_count(&self, body: BodyHandle) -> usize {
        self.bodies.get(&body).map_or(0, |b| b.shapes.len())
    }

    fn allocate_handle(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle = self.next_handle.wrapping_add(1);
        handle
    }

    fn with_body(&mut self, body: BodyHandle, f: impl FnOnce(&mut RigidBody)) {
        if let Some(b) = self.bodies.get_mut(&body) {
            f(b);
        }
    }

    fn substep(&mut self, h: f32) {
        self.apply_springs(h);

        for body in self.bodies.values_mut() {
            body.previous = body.pose;
            if !body.is_simulated() {
                continue;
            }
            let v = &mut body.velocity;
            v.linear += body.gravity * h;
            v.linear *= (1.0 - body.linear_damping).powf(h);
            v.angular *= (1.0 - body.angular_damping).powf(h);
            v.angular *= body.angular_factor;

            body.pose.translation += v.linear * h;
            let w = v.angular;
            let spin = Quat::from_xyzw(w.x, w.y, w.z, 0.0) * body.pose.rotation;
            body.pose.rotation = (body.pose.rotation + spin * (0.5 * h)).normalize();
        }

        self.manifolds = self.detect();
        self.wake_touched();

        for _ in 0..self.config.solver_iterations {
            self.solve_contacts();
            self.solve_joints();
        }

        for body in self.bodies.values_mut() {
            if !body.is_simulated() {
                continue;
            }
            body.velocity.linear = (body.pose.translation - body.previous.translation) / h;
            let mut dq = body.pose.rotation * body.previous.rotation.inverse();
            if dq.w < 0.0 {
                dq = -dq;
            }
            body.velocity.angular = Vec3::new(dq.x, dq.y, dq.z) * (2.0 / h);
            update_sleep(body, h);
        }
    }

    fn detect(&self) -> Vec<ContactManifold> {
        let entries: Vec<(&BodyHandle, &RigidBody)> = self
            .bodies
            .iter()
            .filter(|(_, b)| b.activation != ActivationState::DisableSimulation)
            .collect();
        let mut manifolds = Vec::new();
        for (i, (ha, a)) in entries.iter().enumerate() {
            for (hb, b) in &entries[i + 1..] {
                if !(a.is_dynamic() || b.is_dynamic()) || !a.accepts(b) {
                    continue;
                }
                let points: Vec<ContactPoint> = a
                    .proxies()
                    .flat_map(move |pa| b.proxies().map(move |pb| narrowphase::contact(&pa, &pb)))
                    .filter(|p| p.distance <= CONTACT_MARGIN)
                    .collect();
                if !points.is_empty() {
                    manifolds.push(ContactManifold {
                        body0: **ha,
                        body1: **hb,
                        points,
                    });
                }
            }
        }
        manifolds
    }

    fn wake_touched(&mut self) {
        let mut wake = Vec::new();
        for m in &self.manifolds {
            let (Some(a), Some(b)) = (self.bodies.get(&m.body0), self.bodies.get(&m.body1)) else {
                continue;
            };
            if a.is_simulated() && b.is_dynamic() && !b.activation.is_awake() {
                wake.push(m.body1);
            }
            if b.is_simulated() && a.is_dynamic() && !a.activation.is_awake() {
                wake.push(m.body0);
            }
        }
        for handle in wake {
            self.activate(handle);
        }
    }

    fn solve_contacts(&mut self) {
        for i in 0..self.manifolds.len() {
            let (h0, h1) = (self.manifolds[i].body0, self.manifolds[i].body1);
            let (Some(a), Some(b)) = (self.bodies.get(&h0), self.bodies.get(&h1)) else {
                continue;
            };
            if a.no_response || b.no_response {
                continue;
            }
            let (wa, wb) = (a.inverse_mass(), b.inverse_mass());
            let total = wa + wb;
            if total <= 0.0 {
                continue;
            }
            let deepest = a
                .proxies()
                .flat_map(move |pa| b.proxies().map(move |pb| narrowphase::contact(&pa, &pb)))
                .min_by(|x, y| x.distance.total_cmp(&y.distance));
            let Some(point) = deepest.filter(|p| p.distance < 0.0) else {
                continue;
            };
            let correction = point.normal * -point.distance;
            self.with_body(h0, |body| body.pose.translation -= correction * (wa / total));
            self.with_body(h1, |body| body.pose.translation += correction * (wb / total));
        }
    }

    fn solve_joints(&mut self) {
        let joints: Vec<Joint> = self.joints.values().cloned().collect();
        for joint in joints {
            let (Some(a), Some(b)) = (self.bodies.get(&joint.body), self.bodies.get(&joint.target))
            else {
                continue;
            };
            let (wa, wb) = (a.inverse_mass(), b.inverse_mass());
            let total = wa + wb;
            if total <= 0.0 {
                continue;
            }
            match joint.options.constraint {
                ConstraintKind::Spring => {}
                ConstraintKind::Lock | ConstraintKind::Fixed => {
                    let desired = a.pose.mul_pose(&joint.relative);
                    let delta = desired.translation - b.pose.translation;
                    let share = wb / total;
                    let rotation = b.pose.rotation.slerp(desired.rotation, share);
                    self.with_body(joint.body, |body| {
                        body.pose.translation -= delta * (wa / total);
                    });
                    self.with_body(joint.target, |body| {
                        body.pose.translation += delta * share;
                        body.pose.rotation = rotation.normalize();
                    });
                }
                ConstraintKind::Slider
                | ConstraintKind::Hinge
                | ConstraintKind::ConeTwist
                | ConstraintKind::PointToPoint => {
                    let pa = a.pose.transform_point(joint.options.pivot);
                    let pb = b.pose.transform_point(joint.options.target_pivot);
                    let delta = pb - pa;
                    self.with_body(joint.body, |body| {
                        body.pose.translation += delta * (wa / total);
                    });
                    self.with_body(joint.target, |body| {
                        body.pose.translation -= delta * (wb / total);
                    });
                }
            }
        }
    }

    fn apply_springs(&mut self, h: f32) {
        let springs: Vec<Joint> = self
            .joints
            .values()
            .filter(|j| j.options.constraint == ConstraintKind::Spring)
            .cloned()
            .collect();
        for joint in springs {
            let (Some(a), Some(b)) = (self.bodies.get(&joint.body), self.bodies.get(&joint.target))
            else {
                continue;
            };
            let pa = a.pose.transform_point(joint.options.pivot);
            let pb = b.pose.transform_point(joint.options.target_pivot);
            let offset = pb - pa;
            let length = offset.length();
            if length <= f32::EPSILON {
                continue;
            }
            let dir = offset / length;
            let closing = (b.velocity.linear - a.velocity.linear).dot(dir);
            let force = joint.options.stiffness * (length - joint.rest_length)
                + joint.options.damping * closing;
            let impulse = dir * force * h;
            let (wa, wb) = (a.inverse_mass(), b.inverse_mass());
            self.with_body(joint.body, |body| body.velocity.linear += impulse * wa);
            self.with_body(joint.target, |body| body.velocity.linear -= impulse * wb);
        }
    }
}

fn update_sleep(body: &mut RigidBody, h: f32) {
    if body.activation == ActivationState::DisableDeactivation {
        body.idle_time = 0.0;
        return;
    }
    let v = body.velocity;
    if v.linear.length() < body.linear_threshold && v.angular.length() < body.angular_threshold {
        body.idle_time += h;
        if body.idle_time >= SLEEP_DELAY {
            body.activation = ActivationState::IslandSleeping;
            body.velocity = Velocity::ZERO;
        }
    } else {
        body.idle_time = 0.0;
    }
}

impl PhysicsEngine for ReferenceEngine {
    fn add_body(&mut self, desc: &BodyDesc) -> EngineResult<BodyHandle> {
        if self.torn_down {
            return Err(EngineError::TornDown);
        }
        let o = &desc.options;
        let handle = BodyHandle(self.allocate_handle());
        self.bodies.insert(
            handle,
            RigidBody {
                body_type: o.body_type,
                pose: desc.pose,
                previous: desc.pose,
                velocity: Velocity::ZERO,
                mass: o.mass,
                gravity: o.gravity.unwrap_or(self.config.gravity),
                linear_damping: o.linear_damping,
                angular_damping: o.angular_damping,
                linear_threshold: o.linear_sleeping_threshold,
                angular_threshold: o.angular_sleeping_threshold,
                angular_factor: o.angular_factor,
                activation: o.activation_state,
                idle_time: 0.0,
                no_response: o.disable_collision,
                group: o.collision_filter_group,
                mask: o.collision_filter_mask,
                shapes: BTreeMap::new(),
            },
        );
        trace!(handle = handle.raw(), body_type = %o.body_type, "body added");
        Ok(handle)
    }

    fn remove_body(&mut self, body: BodyHandle) {
        if self.bodies.remove(&body).is_none() {
            return;
        }
        self.joints
            .retain(|_, j| j.body != body && j.target != body);
        self.manifolds
            .retain(|m| m.body0 != body && m.body1 != body);
    }

    fn add_shape(&mut self, body: BodyHandle, shape: &ShapeDesc) -> EngineResult<ShapeHandle> {
        if !self.bodies.contains_key(&body) {
            return Err(EngineError::UnknownBody(body));
        }
        let handle = ShapeHandle(self.allocate_handle());
        self.with_body(body, |b| {
            b.shapes.insert(handle, shape.clone());
        });
        Ok(handle)
    }

    fn remove_shape(&mut self, body: BodyHandle, shape: ShapeHandle) {
        self.with_body(body, |b| {
            b.shapes.remove(&shape);
        });
    }

    fn add_constraint(
        &mut self,
        body: BodyHandle,
        target: BodyHandle,
        options: &ConstraintOptions,
    ) -> EngineResult<ConstraintHandle> {
        let a = self.bodies.get(&body).ok_or(EngineError::UnknownBody(body))?;
        let b = self
            .bodies
            .get(&target)
            .ok_or(EngineError::UnknownBody(target))?;
        let relative = a.pose.inverse().mul_pose(&b.pose);
        let rest_length = a
            .pose
            .transform_point(options.pivot)
            .distance(b.pose.transform_point(options.target_pivot));
        let handle = ConstraintHandle(self.allocate_handle());
        self.joints.insert(
            handle,
            Joint {
                body,
                target,
                options: options.clone(),
                relative,
                rest_length,
            },
        );
        Ok(handle)
    }

    fn remove_constraint(&mut self, constraint: ConstraintHandle) {
        self.joints.remove(&constraint);
    }

    fn step(&mut self, dt: f32) {
        if self.torn_down || dt.is_nan() || dt <= 0.0 {
            return;
        }
        let h = self.config.fixed_time_step;
        self.accumulator += dt;
        let due = (self.accumulator / h).floor();
        self.accumulator -= due * h;
        let steps = (due as u32).min(self.config.max_sub_steps);
        for _ in 0..steps {
            self.substep(h);
        }
    }

    fn manifolds(&self) -> &[ContactManifold] {
        &self.manifolds
    }

    fn pose(&self, body: BodyHandle) -> Option<Pose> {
        self.bodies.get(&body).map(|b| b.pose)
    }

    fn set_pose(&mut self, body: BodyHandle, pose: Pose) {
        self.with_body(body, |b| {
            b.pose = pose;
            b.previous = pose;
        });
    }

    fn velocity(&self, body: BodyHandle) -> Option<Velocity> {
        self.bodies.get(&body).map(|b| b.velocity)
    }

    fn set_velocity(&mut self, body: BodyHandle, velocity: Velocity) {
        self.with_body(body, |b| b.velocity = velocity);
    }

    fn activate(&mut self, body: BodyHandle) {
        self.with_body(body, |b| {
            if matches!(
                b.activation,
                ActivationState::IslandSleeping | ActivationState::WantsDeactivation
            ) {
                b.activation = ActivationState::Active;
            }
            b.idle_time = 0.0;
        });
    }

    fn is_active(&self, body: BodyHandle) -> bool {
        self.bodies
            .get(&body)
            .is_some_and(|b| b.activation.is_awake())
    }

    fn set_activation_state(&mut self, body: BodyHandle, state: ActivationState) {
        self.with_body(body, |b| {
            b.activation = state;
            b.idle_time = 0.0;
            if !state.is_awake() {
                b.velocity = Velocity::ZERO;
            }
        });
    }

    fn set_body_type(&mut self, body: BodyHandle, body_type: BodyType, disable_collision: bool) {
        self.with_body(body, |b| {
            b.body_type = body_type;
            b.no_response = disable_collision;
            if body_type != BodyType::Dynamic {
                b.velocity = Velocity::ZERO;
            }
        });
    }

    fn set_mass(&mut self, body: BodyHandle, mass: f32) {
        self.with_body(body, |b| b.mass = mass);
    }

    fn set_damping(&mut self, body: BodyHandle, linear: f32, angular: f32) {
        self.with_body(body, |b| {
            b.linear_damping = linear;
            b.angular_damping = angular;
        });
    }

    fn set_gravity(&mut self, body: BodyHandle, gravity: Vec3) {
        self.with_body(body, |b| b.gravity = gravity);
    }

    fn set_sleeping_thresholds(&mut self, body: BodyHandle, linear: f32, angular: f32) {
        self.with_body(body, |b| {
            b.linear_threshold = linear;
            b.angular_threshold = angular;
        });
    }

    fn set_angular_factor(&mut self, body: BodyHandle, factor: Vec3) {
        self.with_body(body, |b| b.angular_factor = factor);
    }

    fn set_collision_filter(&mut self, body: BodyHandle, group: u32, mask: u32) {
        self.with_body(body, |b| {
            b.group = group;
            b.mask = mask;
        });
    }

    fn world_gravity(&self) -> Vec3 {
        self.config.gravity
    }

    fn debug_lines(&self, out: &mut Vec<DebugLine>) {
        for body in self.bodies.values() {
            let color = match (body.body_type, body.activation.is_awake()) {
                (BodyType::Dynamic, true) => Vec3::new(0.0, 1.0, 0.0),
                (BodyType::Dynamic, false) => Vec3::new(0.0, 0.0, 1.0),
                _ => Vec3::splat(0.8),
            };
            for proxy in body.proxies() {
                push_box(out, proxy.center(), proxy.half_extents(), color);
            }
        }
        for m in &self.manifolds {
            for p in &m.points {
                out.push(DebugLine {
                    from: p.position,
                    to: p.position + p.normal * 0.2,
                    color: Vec3::new(1.0, 0.0, 0.0),
                });
            }
        }
    }

    fn teardown(&mut self) {
        debug!(
            bodies = self.bodies.len(),
            constraints = self.joints.len(),
            "reference engine torn down"
        );
        self.joints.clear();
        self.bodies.clear();
        self.manifolds.clear();
        self.torn_down = true;
    }
}

fn push_box(out: &mut Vec<DebugLine>, center: Vec3, half: Vec3, color: Vec3) {
    let corner = |i: u32| {
        center
            + half
                * Vec3::new(
                    if i & 1 == 0 { -1.0 } else { 1.0 },
                    if i & 2 == 0 { -1.0 } else { 1.0 },
                    if i & 4 == 0 { -1.0 } else { 1.0 },
                )
    };
    for i in 0..8u32 {
        for bit in [1u32, 2, 4] {
            if i & bit == 0 {
                out.push(DebugLine {
                    from: corner(i),
                    to: corner(i | bit),
                    color,
                });
            }
        }
    }
}
