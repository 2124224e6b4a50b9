//! Coordinate conversion between telemetry frames and the DIS world frame
//!
//! Positions arrive as WGS84 geodetic coordinates and leave as ECEF metres.
//! Attitude arrives as yaw/pitch/roll relative to the local North-East-Down
//! frame and leaves as psi/theta/phi relative to the ECEF axes. Linear and
//! angular velocities stay in the entity's body frame; only their units are
//! normalised here.

use crate::error::PduError;
use omnidis_core::types::{AngleUnit, SpeedUnit};
use serde::{Deserialize, Serialize};

/// WGS84 semi-major axis in meters
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// WGS84 first eccentricity squared
pub const WGS84_E2: f64 = WGS84_F * (2.0 - WGS84_F);

/// Meters per second in one knot
pub const METERS_PER_SECOND_PER_KNOT: f64 = 1852.0 / 3600.0;

const MAX_GEODETIC_ITERATIONS: usize = 20;

type Vec3 = [f64; 3];

/// Geodetic position on the WGS84 ellipsoid
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeodeticPosition {
    /// Latitude in decimal degrees (-90 to 90)
    pub latitude: f64,
    /// Longitude in decimal degrees (-180 to 180)
    pub longitude: f64,
    /// Height above the ellipsoid in meters
    pub altitude: f64,
}

impl GeodeticPosition {
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
        }
    }

    /// Rejects coordinates outside the valid ranges.
    pub fn validate(&self) -> Result<(), PduError> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(PduError::InvalidLatitude(self.latitude));
        }

        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(PduError::InvalidLongitude(self.longitude));
        }

        if !self.altitude.is_finite() {
            return Err(PduError::InvalidAltitude(self.altitude));
        }

        Ok(())
    }
}

/// Earth-centered, Earth-fixed position in meters.
///
/// Only produced by [`geodetic_to_ecef`] or by decoding a received PDU.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeocentricPosition {
    x: f64,
    y: f64,
    z: f64,
}

impl GeocentricPosition {
    pub(crate) fn from_wire(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn z(&self) -> f64 {
        self.z
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Straight-line distance in meters
    pub fn distance_to(&self, other: &GeocentricPosition) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Position reached after moving `dt` seconds at an ECEF velocity.
    pub fn extrapolate(&self, velocity: &[f64; 3], dt: f64) -> GeocentricPosition {
        GeocentricPosition {
            x: self.x + velocity[0] * dt,
            y: self.y + velocity[1] * dt,
            z: self.z + velocity[2] * dt,
        }
    }
}

/// Attitude relative to the local North-East-Down frame, radians
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Orientation {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl Orientation {
    pub fn new(yaw: f64, pitch: f64, roll: f64) -> Self {
        Self { yaw, pitch, roll }
    }
}

/// Euler angles relative to the ECEF axes, radians (DIS psi/theta/phi)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldOrientation {
    pub psi: f64,
    pub theta: f64,
    pub phi: f64,
}

/// Body-frame linear velocity in m/s
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VelocityVector {
    pub u: f64,
    pub v: f64,
    pub w: f64,
}

impl VelocityVector {
    pub fn new(u: f64, v: f64, w: f64) -> Self {
        Self { u, v, w }
    }
}

/// Body-frame angular rates in rad/s
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AngularVelocityVector {
    pub yaw_rate: f64,
    pub pitch_rate: f64,
    pub roll_rate: f64,
}

impl AngularVelocityVector {
    pub fn new(yaw_rate: f64, pitch_rate: f64, roll_rate: f64) -> Self {
        Self {
            yaw_rate,
            pitch_rate,
            roll_rate,
        }
    }
}

/// Units of incoming telemetry; everything downstream is SI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KinematicUnits {
    pub angles: AngleUnit,
    pub speed: SpeedUnit,
}

impl KinematicUnits {
    pub fn new(angles: AngleUnit, speed: SpeedUnit) -> Self {
        Self { angles, speed }
    }

    fn angle(&self, value: f64) -> f64 {
        match self.angles {
            AngleUnit::Radians => value,
            AngleUnit::Degrees => value.to_radians(),
        }
    }

    fn speed(&self, value: f64) -> f64 {
        match self.speed {
            SpeedUnit::MetersPerSecond => value,
            SpeedUnit::Knots => value * METERS_PER_SECOND_PER_KNOT,
        }
    }

    pub fn normalize_orientation(&self, orientation: Orientation) -> Orientation {
        Orientation {
            yaw: self.angle(orientation.yaw),
            pitch: self.angle(orientation.pitch),
            roll: self.angle(orientation.roll),
        }
    }

    pub fn normalize_velocity(&self, velocity: VelocityVector) -> VelocityVector {
        VelocityVector {
            u: self.speed(velocity.u),
            v: self.speed(velocity.v),
            w: self.speed(velocity.w),
        }
    }

    /// Angular rates follow the angle unit (deg/s or rad/s).
    pub fn normalize_angular_velocity(&self, rates: AngularVelocityVector) -> AngularVelocityVector {
        AngularVelocityVector {
            yaw_rate: self.angle(rates.yaw_rate),
            pitch_rate: self.angle(rates.pitch_rate),
            roll_rate: self.angle(rates.roll_rate),
        }
    }
}

/// Converts a geodetic position to ECEF on the WGS84 ellipsoid.
pub fn geodetic_to_ecef(position: &GeodeticPosition) -> Result<GeocentricPosition, PduError> {
    position.validate()?;

    let lat = position.latitude.to_radians();
    let lon = position.longitude.to_radians();
    let (sin_lat, cos_lat) = lat.sin_cos();
    let (sin_lon, cos_lon) = lon.sin_cos();

    let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
    let h = position.altitude;

    Ok(GeocentricPosition {
        x: (n + h) * cos_lat * cos_lon,
        y: (n + h) * cos_lat * sin_lon,
        z: ((1.0 - WGS84_E2) * n + h) * sin_lat,
    })
}

/// Converts ECEF back to geodetic coordinates.
///
/// Fixed-point iteration on latitude; height uses the form that stays well
/// conditioned at the poles, where longitude is arbitrary.
pub fn ecef_to_geodetic(position: &GeocentricPosition) -> GeodeticPosition {
    let GeocentricPosition { x, y, z } = *position;
    let p = x.hypot(y);
    let lon = y.atan2(x);

    let mut lat = z.atan2(p * (1.0 - WGS84_E2));
    for _ in 0..MAX_GEODETIC_ITERATIONS {
        let sin_lat = lat.sin();
        let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
        let next = (z + WGS84_E2 * n * sin_lat).atan2(p);
        let converged = (next - lat).abs() < 1e-15;
        lat = next;
        if converged {
            break;
        }
    }

    let (sin_lat, cos_lat) = lat.sin_cos();
    let alt = p * cos_lat + z * sin_lat - WGS84_A * (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();

    GeodeticPosition {
        latitude: lat.to_degrees(),
        longitude: lon.to_degrees(),
        altitude: alt,
    }
}

/// Converts a local NED attitude to DIS world-frame Euler angles.
pub fn orientation_to_world(
    position: &GeodeticPosition,
    orientation: &Orientation,
) -> WorldOrientation {
    let ned = ned_basis(position);
    let (x_axis, y_axis) = body_axes(&ned, orientation.yaw, orientation.pitch, orientation.roll);
    let (psi, theta, phi) = euler_angles(&WORLD_BASIS, &x_axis, &y_axis);
    WorldOrientation { psi, theta, phi }
}

/// Converts DIS world-frame Euler angles back to a local NED attitude.
pub fn world_to_orientation(
    position: &GeodeticPosition,
    orientation: &WorldOrientation,
) -> Orientation {
    let (x_axis, y_axis) = body_axes(
        &WORLD_BASIS,
        orientation.psi,
        orientation.theta,
        orientation.phi,
    );
    let (yaw, pitch, roll) = euler_angles(&ned_basis(position), &x_axis, &y_axis);
    Orientation { yaw, pitch, roll }
}

/// Rotates a body-frame velocity into ECEF components.
pub fn body_to_world_velocity(
    position: &GeodeticPosition,
    orientation: &Orientation,
    velocity: &VelocityVector,
) -> [f64; 3] {
    let ned = ned_basis(position);
    let (x_axis, y_axis) = body_axes(&ned, orientation.yaw, orientation.pitch, orientation.roll);
    let z_axis = cross(&x_axis, &y_axis);

    let mut world = [0.0; 3];
    for k in 0..3 {
        world[k] = velocity.u * x_axis[k] + velocity.v * y_axis[k] + velocity.w * z_axis[k];
    }
    world
}

/// Angular rates are carried in the entity's own frame, unchanged.
pub fn body_rates_to_angular_velocity(rates: &AngularVelocityVector) -> AngularVelocityVector {
    *rates
}

/// Smallest rotation angle in radians between two world orientations.
pub fn orientation_difference(a: &WorldOrientation, b: &WorldOrientation) -> f64 {
    let (ax, ay) = body_axes(&WORLD_BASIS, a.psi, a.theta, a.phi);
    let (bx, by) = body_axes(&WORLD_BASIS, b.psi, b.theta, b.phi);
    let az = cross(&ax, &ay);
    let bz = cross(&bx, &by);

    // trace(Aᵀ B) = 1 + 2 cos(angle)
    let trace = dot(&ax, &bx) + dot(&ay, &by) + dot(&az, &bz);
    ((trace - 1.0) / 2.0).clamp(-1.0, 1.0).acos()
}

const WORLD_BASIS: [Vec3; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// North, East and Down unit vectors expressed in ECEF.
fn ned_basis(position: &GeodeticPosition) -> [Vec3; 3] {
    let (sin_lat, cos_lat) = position.latitude.to_radians().sin_cos();
    let (sin_lon, cos_lon) = position.longitude.to_radians().sin_cos();

    [
        [-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat],
        [-sin_lon, cos_lon, 0.0],
        [-cos_lat * cos_lon, -cos_lat * sin_lon, -sin_lat],
    ]
}

/// Body x and y axes after a Z-Y-X rotation of `base`.
fn body_axes(base: &[Vec3; 3], psi: f64, theta: f64, phi: f64) -> (Vec3, Vec3) {
    let (s_psi, c_psi) = psi.sin_cos();
    let (s_theta, c_theta) = theta.sin_cos();
    let (s_phi, c_phi) = phi.sin_cos();

    let x_local = [c_theta * c_psi, c_theta * s_psi, -s_theta];
    let y_local = [
        s_phi * s_theta * c_psi - c_phi * s_psi,
        s_phi * s_theta * s_psi + c_phi * c_psi,
        s_phi * c_theta,
    ];

    (combine(base, &x_local), combine(base, &y_local))
}

/// Z-Y-X Euler angles of the body axes relative to `base`.
fn euler_angles(base: &[Vec3; 3], x_axis: &Vec3, y_axis: &Vec3) -> (f64, f64, f64) {
    let [b0, b1, b2] = base;
    let x0 = dot(x_axis, b0);
    let x1 = dot(x_axis, b1);
    let x2 = dot(x_axis, b2);

    let psi = x1.atan2(x0);
    let theta = (-x2).atan2(x0.hypot(x1));

    let (s_psi, c_psi) = psi.sin_cos();
    let (s_theta, c_theta) = theta.sin_cos();
    let y_yawed = combine(base, &[-s_psi, c_psi, 0.0]);
    let z_pitched = combine(base, &[c_psi * s_theta, s_psi * s_theta, c_theta]);
    let phi = dot(y_axis, &z_pitched).atan2(dot(y_axis, &y_yawed));

    (psi, theta, phi)
}

fn combine(base: &[Vec3; 3], c: &Vec3) -> Vec3 {
    let mut out = [0.0; 3];
    for k in 0..3 {
        out[k] = c[0] * base[0][k] + c[1] * base[1][k] + c[2] * base[2][k];
    }
    out
}

fn dot(a: &Vec3, b: &Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: &Vec3, b: &Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}
