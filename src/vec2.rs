use auto_ops::{impl_op_ex, impl_op_ex_commutative};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub const fn null() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    pub fn len_sqr(self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    pub fn len(self) -> f64 {
        self.len_sqr().sqrt()
    }

    pub fn dist(self, other: Self) -> f64 {
        (self - other).len()
    }
}

impl_op_ex!(+|a: &Vec2, b: &Vec2| -> Vec2 { Vec2::new(a.x + b.x, a.y + b.y) });
impl_op_ex!(-|a: &Vec2, b: &Vec2| -> Vec2 { Vec2::new(a.x - b.x, a.y - b.y) });
impl_op_ex!(-|a: &Vec2| -> Vec2 { Vec2::new(-a.x, -a.y) });

impl_op_ex_commutative!(*|a: &Vec2, s: &f64| -> Vec2 { Vec2::new(a.x * s, a.y * s) });
impl_op_ex!(/|a: &Vec2, s: &f64| -> Vec2 { Vec2::new(a.x / s, a.y / s) });

impl_op_ex!(+=|a: &mut Vec2, b: &Vec2| { a.x += b.x; a.y += b.y; });
impl_op_ex!(-=|a: &mut Vec2, b: &Vec2| { a.x -= b.x; a.y -= b.y; });
