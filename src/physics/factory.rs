//! Construction of obstacles from opaque creation parameters.
//!
//! A `Create` delta carries a factory id and a parameter blob; every peer
//! registers the same factories in the same order so the id resolves to the
//! same constructor everywhere.

use crate::error::Result;
use crate::physics::obstacle::{BodyType, FloatConsts, Obstacle, Vec2};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Builds an obstacle from a serialized parameter blob
pub trait ObstacleFactory {
    fn create(&self, params: &[u8]) -> Result<Obstacle>;
}

/// A factory whose parameters are a serde type, encoded with bincode
pub trait ParamFactory {
    type Params: Serialize + DeserializeOwned;

    fn build(&self, params: Self::Params) -> Obstacle;
}

impl<F: ParamFactory> ObstacleFactory for F {
    fn create(&self, params: &[u8]) -> Result<Obstacle> {
        let params: F::Params = bincode::deserialize(params)?;
        Ok(self.build(params))
    }
}

/// Encodes parameters for a [`ParamFactory`]
pub fn encode_params<P: Serialize>(params: &P) -> Result<Vec<u8>> {
    Ok(bincode::serialize(params)?)
}

/// Parameters for a plain rigid body
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyParams {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub angle: f32,
    pub body_type: u32,
    pub density: f32,
}

impl Default for BodyParams {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
            angle: 0.0,
            body_type: BodyType::Dynamic.code(),
            density: 1.0,
        }
    }
}

impl BodyParams {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }
}

/// Builds a plain rigid body from [`BodyParams`]
#[derive(Debug, Clone, Copy, Default)]
pub struct BodyFactory;

impl ParamFactory for BodyFactory {
    type Params = BodyParams;

    fn build(&self, params: BodyParams) -> Obstacle {
        let floats = FloatConsts {
            density: params.density,
            ..FloatConsts::default()
        };
        Obstacle::new(Vec2::new(params.x, params.y))
            .with_velocity(Vec2::new(params.vx, params.vy))
            .with_angle(params.angle)
            .with_body_type(BodyType::from_code(params.body_type).unwrap_or_default())
            .with_float_consts(floats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_factory_roundtrip() {
        let params = BodyParams {
            vx: 2.0,
            body_type: BodyType::Kinematic.code(),
            ..BodyParams::at(1.0, 2.0)
        };
        let blob = encode_params(&params).expect("encodable");
        let obj = BodyFactory.create(&blob).expect("decodable");
        assert_eq!(obj.position(), Vec2::new(1.0, 2.0));
        assert_eq!(obj.vx(), 2.0);
        assert_eq!(obj.body_type(), BodyType::Kinematic);
        assert!(!obj.is_shared());
    }

    #[test]
    fn test_garbage_params_rejected() {
        assert!(BodyFactory.create(&[1, 2]).is_err());
    }
}
