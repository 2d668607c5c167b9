//! Shape parameters as the host exposes them.
//!
//! Geometry is in output pixels. Only what the render path needs lives here:
//! the bounding box, the fragment-shader shape kind and handle positions.

/// Host parameter identifiers.
#[repr(u32)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ParamId {
    LowerLeft = 1,
    UpperRight = 2,
    CircleCenter = 3,
    CircleRadius = 4,
}

impl ParamId {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(ParamId::LowerLeft),
            2 => Some(ParamId::UpperRight),
            3 => Some(ParamId::CircleCenter),
            4 => Some(ParamId::CircleRadius),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ShapeParams {
    /// Corners may be given in any order; the box is normalized.
    Rectangle {
        lower_left: [f32; 2],
        upper_right: [f32; 2],
    },
    Ellipse {
        center: [f32; 2],
        radii: [f32; 2],
    },
}

impl ShapeParams {
    /// Value of `OverlayUniforms::shape_kind` for this shape.
    pub fn kind(&self) -> u32 {
        match self {
            ShapeParams::Rectangle { .. } => 0,
            ShapeParams::Ellipse { .. } => 1,
        }
    }

    /// Axis-aligned bounds as `(min, max)`.
    pub fn bounds(&self) -> ([f32; 2], [f32; 2]) {
        match *self {
            ShapeParams::Rectangle {
                lower_left: a,
                upper_right: b,
            } => (
                [a[0].min(b[0]), a[1].min(b[1])],
                [a[0].max(b[0]), a[1].max(b[1])],
            ),
            ShapeParams::Ellipse { center, radii } => {
                let rx = radii[0].abs();
                let ry = radii[1].abs();
                ([center[0] - rx, center[1] - ry], [center[0] + rx, center[1] + ry])
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        let (min, max) = self.bounds();
        !(max[0] > min[0] && max[1] > min[1])
    }

    /// Positions of the interactive handles, tagged with the parameter each edits.
    pub fn handles(&self) -> Vec<(ParamId, [f32; 2])> {
        match *self {
            ShapeParams::Rectangle {
                lower_left,
                upper_right,
            } => vec![
                (ParamId::LowerLeft, lower_left),
                (ParamId::UpperRight, upper_right),
            ],
            ShapeParams::Ellipse { center, radii } => vec![
                (ParamId::CircleCenter, center),
                (ParamId::CircleRadius, [center[0] + radii[0].abs(), center[1]]),
            ],
        }
    }
}
