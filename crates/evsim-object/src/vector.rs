//! Cartesian vectors, written `x:y:z`

use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

use evsim_core::KernelError;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vector3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vector2D {
    pub x: f64,
    pub y: f64,
}

impl Vector3D {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Vector3D { x, y, z }
    }

    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn distance(&self, other: &Vector3D) -> f64 {
        (*self - *other).length()
    }
}

impl Vector2D {
    pub const fn new(x: f64, y: f64) -> Self {
        Vector2D { x, y }
    }

    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

impl Add for Vector3D {
    type Output = Vector3D;

    fn add(self, rhs: Vector3D) -> Vector3D {
        Vector3D::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector3D {
    type Output = Vector3D;

    fn sub(self, rhs: Vector3D) -> Vector3D {
        Vector3D::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl fmt::Display for Vector3D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.x, self.y, self.z)
    }
}

impl fmt::Display for Vector2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.x, self.y)
    }
}

fn parse_components<const N: usize>(s: &str, expected: &str) -> Result<[f64; N], KernelError> {
    let malformed = || KernelError::MalformedValue {
        expected: expected.into(),
        value: s.into(),
    };
    let mut out = [0.0; N];
    let mut parts = s.trim().split(':');
    for slot in out.iter_mut() {
        *slot = parts
            .next()
            .and_then(|p| p.trim().parse().ok())
            .ok_or_else(malformed)?;
    }
    if parts.next().is_some() {
        return Err(malformed());
    }
    Ok(out)
}

impl FromStr for Vector3D {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [x, y, z] = parse_components::<3>(s, "Vector3D")?;
        Ok(Vector3D::new(x, y, z))
    }
}

impl FromStr for Vector2D {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [x, y] = parse_components::<2>(s, "Vector2D")?;
        Ok(Vector2D::new(x, y))
    }
}
