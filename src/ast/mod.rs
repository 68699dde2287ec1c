/// Record model for parsed CLSF sources.
/// One `Record` per semantic unit of the source, in source order.

use cgmath::{Point3, Vector3};

/// A single operand from a record's operand list.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Number(f64),
    Word(String),
}

impl Operand {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Operand::Number(n) => Some(*n),
            Operand::Word(_) => None,
        }
    }

    pub fn as_word(&self) -> Option<&str> {
        match self {
            Operand::Word(w) => Some(w),
            Operand::Number(_) => None,
        }
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Number(n) => write!(f, "{}", n),
            Operand::Word(w) => write!(f, "{}", w),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// 1-based physical line number of the (first) source line.
    pub line: usize,
    pub kind: RecordKind,
    pub operands: Vec<Operand>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordKind {
    /// Start of an operation, with its tool definition (one or two lines).
    ToolPath(ToolPath),
    LoadTool,
    GoTo(Coordinate),
    Circle(Circle),
    FedRat { feed: f64 },
    Rapid,
    EndOfPath,
    /// A `TLDATA` line that does not follow a `TOOL PATH`.
    ToolData,
    /// Any other keyword, with its operand text as written
    Other { keyword: String, text: String },
}

impl RecordKind {
    /// Short name for diagnostics.
    pub fn keyword(&self) -> &str {
        match self {
            RecordKind::ToolPath(_) => "TOOL PATH",
            RecordKind::LoadTool => "LOAD",
            RecordKind::GoTo(_) => "GOTO",
            RecordKind::Circle(_) => "CIRCLE",
            RecordKind::FedRat { .. } => "FEDRAT",
            RecordKind::Rapid => "RAPID",
            RecordKind::EndOfPath => "END-OF-PATH",
            RecordKind::ToolData => "TLDATA",
            RecordKind::Other { keyword, .. } => keyword,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolPath {
    pub operation: String,
    pub tool: ToolSpec,
    /// Number of physical lines the record spans (1, or 2 with `TLDATA`).
    pub span: usize,
}

/// Tool geometry as declared in the CLSF
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    /// Tool-data type label, e.g. `MILL`
    pub kind: String,
    pub diameter: f64,
    pub lower_radius: f64,
    pub taper_angle: f64,
    pub tip_angle: f64,
}

/// Position plus optional tool-axis direction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub position: Point3<f64>,
    pub direction: Option<Vector3<f64>>,
}

impl Coordinate {
    pub fn new(position: Point3<f64>, direction: Option<Vector3<f64>>) -> Self {
        Self { position, direction }
    }
}

/// Returns true when `direction` is exactly the tool-vertical axis (0,0,1).
pub fn is_vertical(direction: &Vector3<f64>) -> bool {
    direction.x == 0.0 && direction.y == 0.0 && direction.z == 1.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub center: Point3<f64>,
    pub radius: f64,
}
