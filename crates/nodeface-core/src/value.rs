//! Default value records carried by interface sockets.
//!
//! Each socket stores a [`SocketValue`] matching the data type of its socket
//! type. Numeric records carry a soft range whose `max` is never below `min`:
//! [`Bounds`] raises `max` to `min` whenever an edit would invert the range.

use serde::{Deserialize, Serialize};

use crate::registry::{PropSubtype, SocketDataType};

/// A `min..=max` pair that keeps `max >= min`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds<T> {
    min: T,
    max: T,
}

impl<T: PartialOrd + Copy> Bounds<T> {
    /// Creates bounds, raising `max` to `min` if the pair is inverted.
    pub fn new(min: T, max: T) -> Self {
        let max = if max < min { min } else { max };
        Bounds { min, max }
    }

    pub fn min(&self) -> T {
        self.min
    }

    pub fn max(&self) -> T {
        self.max
    }

    /// Sets the lower bound. Drags `max` along if it would fall below.
    pub fn set_min(&mut self, min: T) {
        self.min = min;
        if self.max < min {
            self.max = min;
        }
    }

    /// Sets the upper bound, clamped up to the current `min`.
    pub fn set_max(&mut self, max: T) {
        self.max = if max < self.min { self.min } else { max };
    }

    /// Restores `max >= min` on bounds that bypassed the setters
    /// (e.g. deserialized data). Returns `true` if anything changed.
    pub fn normalize(&mut self) -> bool {
        if self.max < self.min {
            self.max = self.min;
            true
        } else {
            false
        }
    }
}

/// Float default value with soft range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloatValue {
    pub value: f32,
    pub bounds: Bounds<f32>,
}

/// Integer default value with soft range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntValue {
    pub value: i32,
    pub bounds: Bounds<i32>,
}

/// 3D vector default value; the soft range applies per component.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VectorValue {
    pub value: [f32; 3],
    pub bounds: Bounds<f32>,
}

/// The kind-specific default value record of an interface socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SocketValue {
    /// Data types without an editable default (geometry, shader, objects...).
    None,
    Float(FloatValue),
    Int(IntValue),
    Bool { value: bool },
    Vector(VectorValue),
    Color { value: [f32; 4] },
    String { value: String },
}

/// UI range reported for a numeric default value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValueRange {
    Float {
        hard_min: f32,
        hard_max: f32,
        soft_min: f32,
        soft_max: f32,
    },
    Int {
        hard_min: i32,
        hard_max: i32,
        soft_min: i32,
        soft_max: i32,
    },
}

impl SocketValue {
    /// Creates the initial default value for a socket of the given type.
    pub fn for_type(data_type: SocketDataType, subtype: PropSubtype) -> Self {
        match data_type {
            SocketDataType::Float => {
                let bounds = match subtype {
                    PropSubtype::Factor => Bounds::new(0.0, 1.0),
                    PropSubtype::Percentage => Bounds::new(0.0, 100.0),
                    PropSubtype::Unsigned => Bounds::new(0.0, f32::MAX),
                    _ => Bounds::new(f32::MIN, f32::MAX),
                };
                SocketValue::Float(FloatValue { value: 0.0, bounds })
            }
            SocketDataType::Int => {
                let bounds = match subtype {
                    PropSubtype::Unsigned => Bounds::new(0, i32::MAX),
                    _ => Bounds::new(i32::MIN, i32::MAX),
                };
                SocketValue::Int(IntValue { value: 0, bounds })
            }
            SocketDataType::Bool => SocketValue::Bool { value: false },
            SocketDataType::Vector => SocketValue::Vector(VectorValue {
                value: [0.0; 3],
                bounds: Bounds::new(f32::MIN, f32::MAX),
            }),
            SocketDataType::Color => SocketValue::Color {
                value: [0.8, 0.8, 0.8, 1.0],
            },
            SocketDataType::String => SocketValue::String {
                value: String::new(),
            },
            _ => SocketValue::None,
        }
    }

    /// Returns the UI range of a numeric value, correcting an inverted soft
    /// range first. `subtype` is the subtype of the socket's type; unsigned
    /// floats and ints get a hard minimum of zero. Vectors ignore the subtype.
    pub fn ui_range(&mut self, subtype: PropSubtype) -> Option<ValueRange> {
        let unsigned = subtype == PropSubtype::Unsigned;
        match self {
            SocketValue::Float(v) => {
                v.bounds.normalize();
                Some(ValueRange::Float {
                    hard_min: if unsigned { 0.0 } else { f32::MIN },
                    hard_max: f32::MAX,
                    soft_min: v.bounds.min(),
                    soft_max: v.bounds.max(),
                })
            }
            SocketValue::Int(v) => {
                v.bounds.normalize();
                Some(ValueRange::Int {
                    hard_min: if unsigned { 0 } else { i32::MIN },
                    hard_max: i32::MAX,
                    soft_min: v.bounds.min(),
                    soft_max: v.bounds.max(),
                })
            }
            SocketValue::Vector(v) => {
                v.bounds.normalize();
                Some(ValueRange::Float {
                    hard_min: f32::MIN,
                    hard_max: f32::MAX,
                    soft_min: v.bounds.min(),
                    soft_max: v.bounds.max(),
                })
            }
            _ => None,
        }
    }

    /// Returns `true` if the record has no editable default.
    pub fn is_none(&self) -> bool {
        matches!(self, SocketValue::None)
    }
}
