use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// How a body participates in the simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyType {
    /// Never moves; infinite mass.
    Static,
    /// Posed by the host; the engine reads its transform but never integrates it.
    Kinematic,
    /// Driven by the engine.
    #[default]
    Dynamic,
}

impl fmt::Display for BodyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static => write!(f, "static"),
            Self::Kinematic => write!(f, "kinematic"),
            Self::Dynamic => write!(f, "dynamic"),
        }
    }
}

/// Sleep/activation state of a body, as understood by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationState {
    /// Awake and simulated.
    #[default]
    Active,
    /// Asleep together with its island.
    IslandSleeping,
    /// Below the sleeping thresholds, about to sleep.
    WantsDeactivation,
    /// Never allowed to fall asleep.
    DisableDeactivation,
    /// Excluded from simulation entirely.
    DisableSimulation,
}

impl ActivationState {
    /// Whether the engine should integrate a body in this state.
    pub fn is_awake(self) -> bool {
        matches!(
            self,
            Self::Active | Self::WantsDeactivation | Self::DisableDeactivation
        )
    }
}

/// Full description of a body at creation time.
///
/// Every field has a default, so hosts only send what they care about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyOptions {
    /// Static, kinematic, or dynamic.
    #[serde(rename = "type")]
    pub body_type: BodyType,
    /// Mass in kilograms. Only dynamic bodies use it.
    pub mass: f32,
    /// Per-body gravity; `None` means world gravity.
    pub gravity: Option<Vec3>,
    /// Linear velocity damping, 0..=1.
    pub linear_damping: f32,
    /// Angular velocity damping, 0..=1.
    pub angular_damping: f32,
    /// Linear speed under which the body may fall asleep.
    pub linear_sleeping_threshold: f32,
    /// Angular speed under which the body may fall asleep.
    pub angular_sleeping_threshold: f32,
    /// Per-axis multiplier on angular motion.
    pub angular_factor: Vec3,
    /// Initial activation state.
    pub activation_state: ActivationState,
    /// Detect contacts but never respond to them.
    pub disable_collision: bool,
    /// Collision filter group bits.
    pub collision_filter_group: u32,
    /// Collision filter mask bits.
    pub collision_filter_mask: u32,
}

impl Default for BodyOptions {
    fn default() -> Self {
        Self {
            body_type: BodyType::Dynamic,
            mass: 1.0,
            gravity: None,
            linear_damping: 0.01,
            angular_damping: 0.01,
            linear_sleeping_threshold: 1.6,
            angular_sleeping_threshold: 2.5,
            angular_factor: Vec3::ONE,
            activation_state: ActivationState::Active,
            disable_collision: false,
            collision_filter_group: 1,
            collision_filter_mask: 1,
        }
    }
}

impl BodyOptions {
    /// Options for a body of the given type, everything else default.
    pub fn of_type(body_type: BodyType) -> Self {
        Self {
            body_type,
            ..Self::default()
        }
    }

    /// Set the body type.
    pub fn with_type(mut self, body_type: BodyType) -> Self {
        self.body_type = body_type;
        self
    }

    /// Set the mass.
    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    /// Override world gravity for this body.
    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = Some(gravity);
        self
    }

    /// Set the initial activation state.
    pub fn with_activation_state(mut self, state: ActivationState) -> Self {
        self.activation_state = state;
        self
    }

    /// Set collision filter group and mask.
    pub fn with_collision_filter(mut self, group: u32, mask: u32) -> Self {
        self.collision_filter_group = group;
        self.collision_filter_mask = mask;
        self
    }

    /// Reject values the engine cannot represent.
    pub fn validate(&self) -> CoreResult<()> {
        check_mass(self.mass)?;
        check_damping("linear_damping", self.linear_damping)?;
        check_damping("angular_damping", self.angular_damping)?;
        check_threshold("linear_sleeping_threshold", self.linear_sleeping_threshold)?;
        check_threshold("angular_sleeping_threshold", self.angular_sleeping_threshold)?;
        if let Some(g) = self.gravity {
            check_vec("gravity", g)?;
        }
        check_vec("angular_factor", self.angular_factor)
    }

    /// Apply a partial update, returning which groups of properties changed.
    ///
    /// Only fields that are present and different from the current value
    /// count as changes.
    pub fn apply(&mut self, update: &BodyUpdate) -> BodyChanges {
        let mut changes = BodyChanges::default();

        if let Some(t) = update.body_type.filter(|t| *t != self.body_type) {
            self.body_type = t;
            changes.collision_flags = true;
        }
        if let Some(d) = update.disable_collision.filter(|d| *d != self.disable_collision) {
            self.disable_collision = d;
            changes.collision_flags = true;
        }
        if let Some(s) = update
            .activation_state
            .filter(|s| *s != self.activation_state)
        {
            self.activation_state = s;
            changes.activation_state = true;
        }
        if let Some(g) = update
            .collision_filter_group
            .filter(|g| *g != self.collision_filter_group)
        {
            self.collision_filter_group = g;
            changes.collision_filter = true;
        }
        if let Some(m) = update
            .collision_filter_mask
            .filter(|m| *m != self.collision_filter_mask)
        {
            self.collision_filter_mask = m;
            changes.collision_filter = true;
        }
        if let Some(d) = update.linear_damping.filter(|d| *d != self.linear_damping) {
            self.linear_damping = d;
            changes.damping = true;
        }
        if let Some(d) = update.angular_damping.filter(|d| *d != self.angular_damping) {
            self.angular_damping = d;
            changes.damping = true;
        }
        if let Some(g) = update.gravity.filter(|g| self.gravity != Some(*g)) {
            self.gravity = Some(g);
            changes.gravity = true;
        }
        if let Some(t) = update
            .linear_sleeping_threshold
            .filter(|t| *t != self.linear_sleeping_threshold)
        {
            self.linear_sleeping_threshold = t;
            changes.sleeping_thresholds = true;
        }
        if let Some(t) = update
            .angular_sleeping_threshold
            .filter(|t| *t != self.angular_sleeping_threshold)
        {
            self.angular_sleeping_threshold = t;
            changes.sleeping_thresholds = true;
        }
        if let Some(f) = update.angular_factor.filter(|f| {
            !crate::math::vec3_approx_eq(*f, self.angular_factor, crate::constants::POSE_EPSILON)
        }) {
            self.angular_factor = f;
            changes.angular_factor = true;
        }
        if let Some(m) = update.mass.filter(|m| *m != self.mass) {
            self.mass = m;
            changes.mass = true;
        }

        changes
    }
}

/// A partial body update: absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyUpdate {
    /// New body type.
    #[serde(rename = "type")]
    pub body_type: Option<BodyType>,
    /// New mass.
    pub mass: Option<f32>,
    /// New per-body gravity.
    pub gravity: Option<Vec3>,
    /// New linear damping.
    pub linear_damping: Option<f32>,
    /// New angular damping.
    pub angular_damping: Option<f32>,
    /// New linear sleeping threshold.
    pub linear_sleeping_threshold: Option<f32>,
    /// New angular sleeping threshold.
    pub angular_sleeping_threshold: Option<f32>,
    /// New angular factor.
    pub angular_factor: Option<Vec3>,
    /// New activation state.
    pub activation_state: Option<ActivationState>,
    /// Toggle contact response.
    pub disable_collision: Option<bool>,
    /// New collision filter group.
    pub collision_filter_group: Option<u32>,
    /// New collision filter mask.
    pub collision_filter_mask: Option<u32>,
}

impl BodyUpdate {
    /// An update that only changes the body type.
    pub fn body_type(body_type: BodyType) -> Self {
        Self {
            body_type: Some(body_type),
            ..Self::default()
        }
    }

    /// An update that only changes gravity.
    pub fn gravity(gravity: Vec3) -> Self {
        Self {
            gravity: Some(gravity),
            ..Self::default()
        }
    }

    /// Same checks as [`BodyOptions::validate`], applied to present fields.
    pub fn validate(&self) -> CoreResult<()> {
        if let Some(m) = self.mass {
            check_mass(m)?;
        }
        if let Some(d) = self.linear_damping {
            check_damping("linear_damping", d)?;
        }
        if let Some(d) = self.angular_damping {
            check_damping("angular_damping", d)?;
        }
        if let Some(t) = self.linear_sleeping_threshold {
            check_threshold("linear_sleeping_threshold", t)?;
        }
        if let Some(t) = self.angular_sleeping_threshold {
            check_threshold("angular_sleeping_threshold", t)?;
        }
        if let Some(g) = self.gravity {
            check_vec("gravity", g)?;
        }
        if let Some(f) = self.angular_factor {
            check_vec("angular_factor", f)?;
        }
        Ok(())
    }
}

/// Which property groups a [`BodyUpdate`] actually changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BodyChanges {
    /// Body type or contact response changed.
    pub collision_flags: bool,
    /// Activation state changed.
    pub activation_state: bool,
    /// Filter group or mask changed.
    pub collision_filter: bool,
    /// Linear or angular damping changed.
    pub damping: bool,
    /// Gravity override changed.
    pub gravity: bool,
    /// A sleeping threshold changed.
    pub sleeping_thresholds: bool,
    /// Angular factor changed.
    pub angular_factor: bool,
    /// Mass changed.
    pub mass: bool,
}

impl BodyChanges {
    /// True when nothing changed.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn check_mass(mass: f32) -> CoreResult<()> {
    if mass.is_finite() && mass >= 0.0 {
        Ok(())
    } else {
        Err(CoreError::OutOfRange {
            field: "mass",
            value: mass,
            reason: "must be finite and non-negative",
        })
    }
}

fn check_damping(field: &'static str, value: f32) -> CoreResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(CoreError::OutOfRange {
            field,
            value,
            reason: "must be within 0..=1",
        })
    }
}

fn check_threshold(field: &'static str, value: f32) -> CoreResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(CoreError::OutOfRange {
            field,
            value,
            reason: "must be finite and non-negative",
        })
    }
}

fn check_vec(field: &'static str, v: Vec3) -> CoreResult<()> {
    match v.to_array().into_iter().find(|c| !c.is_finite()) {
        Some(value) => Err(CoreError::OutOfRange {
            field,
            value,
            reason: "components must be finite",
        }),
        None => Ok(()),
    }
}
