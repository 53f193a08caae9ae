//! Initial dungeon state for a joining weapon ball.
//!
//! The alert server runs the actual simulation; this side only hands it
//! plausible starting values. Randomness comes from a [`SpawnSource`] so
//! tests can pin every draw.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::types::WeaponBall;

/// Spawn coordinates are drawn from `[SPAWN_OFFSET, SPAWN_OFFSET + SPAWN_RANGE)`.
const SPAWN_RANGE: f64 = 200.0;
const SPAWN_OFFSET: f64 = 100.0;

/// Velocity components are drawn from `[-VELOCITY_RANGE / 2, VELOCITY_RANGE / 2)`.
const VELOCITY_RANGE: f64 = 4.0;

const STARTING_HP: u32 = 100;
const BALL_SIZE: u32 = 20;

const UNARMED_MAX_SPEED: u32 = 3;
const ARMED_MAX_SPEED: u32 = 15;

/// Source of uniform draws in `[0, 1)`.
pub trait SpawnSource: Send + Sync {
    fn next_unit(&self) -> f64;
}

/// [`SpawnSource`] backed by the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngSpawn;

impl SpawnSource for ThreadRngSpawn {
    fn next_unit(&self) -> f64 {
        rand::rng().random::<f64>()
    }
}

/// Weapon descriptor in the alert server's ball format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallWeapon {
    #[serde(rename = "type")]
    pub kind: String,
}

/// A weapon ball ready to be dropped into the next dungeon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DungeonBall {
    pub id: String,
    pub name: String,
    pub weapon: BallWeapon,
    pub color: String,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub hp: u32,
    pub max_hp: u32,
    pub size: u32,
    pub team: u8,
    pub max_speed: u32,
}

/// Speed cap for a weapon: unarmed balls are much slower.
pub fn max_speed_for(ball: &WeaponBall) -> u32 {
    if ball.is_unarmed() {
        UNARMED_MAX_SPEED
    } else {
        ARMED_MAX_SPEED
    }
}

/// Builds the spawn state for `ball`, drawing in order x, y, vx, vy, team.
pub fn build_dungeon_ball(user_id: &str, ball: &WeaponBall, rng: &dyn SpawnSource) -> DungeonBall {
    let x = rng.next_unit() * SPAWN_RANGE + SPAWN_OFFSET;
    let y = rng.next_unit() * SPAWN_RANGE + SPAWN_OFFSET;
    let vx = rng.next_unit() * VELOCITY_RANGE - VELOCITY_RANGE / 2.0;
    let vy = rng.next_unit() * VELOCITY_RANGE - VELOCITY_RANGE / 2.0;
    let team = if rng.next_unit() > 0.5 { 0 } else { 1 };

    DungeonBall {
        id: user_id.to_string(),
        name: ball.name.clone(),
        weapon: BallWeapon {
            kind: ball.weapon.clone(),
        },
        color: ball.color.clone(),
        x,
        y,
        vx,
        vy,
        hp: STARTING_HP,
        max_hp: STARTING_HP,
        size: BALL_SIZE,
        team,
        max_speed: max_speed_for(ball),
    }
}
