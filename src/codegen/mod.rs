//! G-code generator
//! Walks parsed CLSF records, tracks machine state and writes UMC-750 G-code

use crate::arc::{self, ArcDirection};
use crate::ast::{is_vertical, Circle, Coordinate, Record, RecordKind};
use crate::geometry::{to_tool_frame, RotaryAngles};
use crate::kinematics::{self, KinematicsError};
use crate::machine::MachineProfile;
use crate::parser::{self, ParseError};
use crate::registry::{self, Registry, Settings};
use cgmath::Point3;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslateError {
    #[error(transparent)]
    Malformed(#[from] ParseError),

    #[error("line {line}: tool axis ({i}, {j}, {k}) has no rotary solution")]
    DegenerateOrientation { line: usize, i: f64, j: f64, k: f64 },

    #[error("line {line}: tool {name} has no spindle speed or compensation in the machine profile")]
    UnknownToolName { line: usize, name: String },

    #[error("line {line}: B{beta:.4} is outside B-axis travel [{min}, {max}] even after flipping C")]
    UnresolvedTravelLimit {
        line: usize,
        beta: f64,
        min: f64,
        max: f64,
    },

    #[error("line {line}: CIRCLE is not followed by a GOTO end point")]
    ArcWithoutEndpoint { line: usize },

    #[error("line {line}: arc starts from an unknown position")]
    ArcWithoutStart { line: usize },

    /// The registry was indexed from a different record list
    #[error("line {line}: TOOL PATH is not operation {index} of the tool registry")]
    UnindexedOperation { line: usize, index: usize },
}

impl TranslateError {
    /// Source line the error points at
    pub fn line(&self) -> usize {
        match self {
            TranslateError::Malformed(err) => err.line(),
            TranslateError::DegenerateOrientation { line, .. }
            | TranslateError::UnknownToolName { line, .. }
            | TranslateError::UnresolvedTravelLimit { line, .. }
            | TranslateError::ArcWithoutEndpoint { line }
            | TranslateError::ArcWithoutStart { line }
            | TranslateError::UnindexedOperation { line, .. } => *line,
        }
    }

    fn kinematics(err: KinematicsError, line: usize) -> Self {
        match err {
            KinematicsError::DegenerateOrientation { i, j, k } => {
                TranslateError::DegenerateOrientation { line, i, j, k }
            }
            KinematicsError::UnresolvedTravelLimit { beta, min, max } => {
                TranslateError::UnresolvedTravelLimit {
                    line,
                    beta,
                    min,
                    max,
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct GCodeOutput {
    pub lines: Vec<String>,
    pub line_number: u32,
    pub step: u32,
}

impl GCodeOutput {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            line_number: 5,
            step: 5,
        }
    }

    /// Numbered block
    pub fn emit(&mut self, code: &str) {
        self.lines.push(format!("N{} {}", self.line_number, code));
        self.line_number += self.step;
    }

    pub fn emit_comment(&mut self, comment: &str) {
        self.lines.push(format!("( {} )", comment));
    }

    /// Unnumbered line, written as given
    pub fn emit_text(&mut self, text: &str) {
        self.lines.push(text.to_string());
    }

    pub fn blank(&mut self) {
        self.lines.push(String::new());
    }

    /// Number of numbered blocks written so far
    pub fn blocks(&self) -> usize {
        self.lines.iter().filter(|l| l.starts_with('N')).count()
    }
}

impl std::fmt::Display for GCodeOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// Modal motion group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionMode {
    Rapid,
    Linear,
    Clockwise,
    CounterClockwise,
}

impl MotionMode {
    pub fn code(self) -> &'static str {
        match self {
            MotionMode::Rapid => "G00",
            MotionMode::Linear => "G01",
            MotionMode::Clockwise => "G02",
            MotionMode::CounterClockwise => "G03",
        }
    }
}

impl From<ArcDirection> for MotionMode {
    fn from(direction: ArcDirection) -> Self {
        match direction {
            ArcDirection::Clockwise => MotionMode::Clockwise,
            ArcDirection::CounterClockwise => MotionMode::CounterClockwise,
        }
    }
}

/// What the controller is known to hold after the blocks emitted so far
#[derive(Debug, Clone, PartialEq)]
pub struct MachineState {
    /// X, Y, Z in the rotated frame; `None` until commanded or after homing
    pub position: [Option<f64>; 3],
    pub rotary: RotaryAngles,
    pub motion: Option<MotionMode>,
    pub tool: Option<u32>,
    /// G254 active
    pub dynamic_offset: bool,
}

impl Default for MachineState {
    fn default() -> Self {
        Self {
            position: [None; 3],
            rotary: RotaryAngles::ZERO,
            motion: None,
            tool: None,
            dynamic_offset: false,
        }
    }
}

/// Result of dispatching one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    /// Records used up, including the dispatched one
    pub consumed: usize,
}

impl Dispatch {
    fn single() -> Self {
        Self { consumed: 1 }
    }
}

/// Axis values are written, and compared, at 4 decimals.
fn format_value(value: f64) -> String {
    let formatted = format!("{:.4}", value);
    if formatted == "-0.0000" {
        "0.0000".to_string()
    } else {
        formatted
    }
}

fn axis_word(letter: char, value: f64) -> String {
    format!("{}{}", letter, format_value(value))
}

/// True when `next` would print differently from what the machine holds.
fn differs(current: Option<f64>, next: f64) -> bool {
    current.map_or(true, |current| format_value(current) != format_value(next))
}

fn at_zero(value: Option<f64>) -> bool {
    value.map_or(false, |value| format_value(value) == format_value(0.0))
}

pub struct Translator<'a> {
    records: &'a [Record],
    profile: &'a MachineProfile,
    registry: Registry,
    output: GCodeOutput,
    state: MachineState,
    /// Index of the current operation, 0 before the first `TOOL PATH`
    operation: usize,
    /// A tool change was started and the load sequence is still owed
    pending_load: bool,
    /// Length compensation words for the first move after a load
    pending_compensation: Option<String>,
}

impl<'a> Translator<'a> {
    /// Index tools and operations, ready to emit.
    pub fn new(records: &'a [Record], profile: &'a MachineProfile) -> Self {
        Self {
            records,
            profile,
            registry: registry::index_operations(records, profile),
            output: GCodeOutput::new(),
            state: MachineState::default(),
            operation: 0,
            pending_load: false,
            pending_compensation: None,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Emission pass over every record
    pub fn run(mut self) -> Result<GCodeOutput, TranslateError> {
        let mut cursor = 0;
        while cursor < self.records.len() {
            let dispatch = self.dispatch(cursor)?;
            cursor += dispatch.consumed;
        }
        Ok(self.output)
    }

    fn dispatch(&mut self, cursor: usize) -> Result<Dispatch, TranslateError> {
        let records = self.records;
        let record = &records[cursor];
        let previous = cursor.checked_sub(1).map(|i| &records[i].kind);

        match &record.kind {
            RecordKind::ToolPath(_) => {
                self.new_operation(record.line)?;
                Ok(Dispatch::single())
            }
            RecordKind::LoadTool => {
                if self.pending_load {
                    self.load_tool(record.line)?;
                }
                Ok(Dispatch::single())
            }
            RecordKind::GoTo(target) => {
                let (mode, feed) = match previous {
                    Some(RecordKind::Rapid) => (MotionMode::Rapid, None),
                    Some(RecordKind::FedRat { feed }) => (MotionMode::Linear, Some(*feed)),
                    _ => (MotionMode::Linear, None),
                };
                self.linear_move(target, mode, feed, record.line)?;
                Ok(Dispatch::single())
            }
            RecordKind::Circle(circle) => {
                let end = match records.get(cursor + 1).map(|next| &next.kind) {
                    Some(RecordKind::GoTo(end)) => end,
                    _ => return Err(TranslateError::ArcWithoutEndpoint { line: record.line }),
                };
                let feed = match previous {
                    Some(RecordKind::FedRat { feed }) => Some(*feed),
                    _ => None,
                };
                self.circular_move(circle, end, feed, record.line)?;
                Ok(Dispatch { consumed: 2 })
            }
            RecordKind::EndOfPath => {
                self.end_of_path();
                Ok(Dispatch::single())
            }
            // Picked up by the motion record that follows
            RecordKind::FedRat { .. } | RecordKind::Rapid => Ok(Dispatch::single()),
            RecordKind::ToolData => {
                tracing::debug!(line = record.line, "TLDATA outside a tool path");
                Ok(Dispatch::single())
            }
            RecordKind::Other { keyword, text } => {
                tracing::debug!(line = record.line, %keyword, %text, "record has no G-code");
                Ok(Dispatch::single())
            }
        }
    }

    fn tool_table(&mut self) {
        self.output
            .emit_text("(----------------- TOOL TABLE SUMMARY --------------------)");
        self.output.emit_text(&format!(
            "({:<11}{:<28}{:<11}{:<7})",
            "TOOL-NO.", "TOOL-NAME", "DIAMETER", "OFFSET"
        ));
        for tool in self.registry.tools.values() {
            self.output.emit_text(&format!(
                "(   {:<8}{:<29}{:<11.4}{:<6})",
                tool.slot,
                tool.name(),
                tool.spec.diameter,
                tool.offset()
            ));
        }
        self.output
            .emit_text("(--------------END OF TOOL TABLE SUMMARY -----------------)");
    }

    fn new_operation(&mut self, line: usize) -> Result<(), TranslateError> {
        self.operation += 1;
        let index = self.operation;

        let (Some(operation), Some(tool)) = (
            self.registry.operation(index).cloned(),
            self.registry.tool_for(index).cloned(),
        ) else {
            return Err(TranslateError::UnindexedOperation { line, index });
        };

        let first = index == 1;
        let previous_slot = self.registry.operation(index - 1).map(|op| op.slot);
        let tool_change = first || previous_slot != Some(operation.slot);

        tracing::debug!(
            operation = %operation.name,
            index = operation.index,
            line = operation.line,
            tool = tool.slot,
            tool_change,
            "operation"
        );

        if first {
            self.tool_table();
            self.output.blank();
            self.output.emit("G40 G17 G94 G98 G90 G00 G49 G20");
            self.state.motion = Some(MotionMode::Rapid);
            self.output.blank();
        } else {
            self.output.blank();
        }

        if tool_change {
            self.output.emit_comment(&format!(
                "*** TOOL CHANGE: T{:02}: {} ***",
                tool.slot,
                tool.name()
            ));
            self.output.blank();
        }
        self.output
            .emit_comment(&format!("OPER: {}", operation.name));

        if self.state.dynamic_offset {
            self.output.emit("G255");
            self.state.dynamic_offset = false;
        }

        if tool_change {
            self.return_home();
            self.pending_load = true;
        }
        Ok(())
    }

    /// Retract Z, then send the linear and rotary axes home.
    fn return_home(&mut self) {
        self.output.emit("G53 G00 Z0.0");

        let [x, y, _] = self.state.position;
        let linear: Vec<&str> = [("X0.0000", x), ("Y0.0000", y)]
            .into_iter()
            .filter(|(_, value)| !at_zero(*value))
            .map(|(word, _)| word)
            .collect();
        if !linear.is_empty() {
            self.output.emit(&format!("G91 G28 {}", linear.join(" ")));
        }

        let RotaryAngles { beta, gamma } = self.state.rotary;
        let rotary: Vec<&str> = [("B0.0000", beta), ("C0.0000", gamma)]
            .into_iter()
            .filter(|(_, value)| !at_zero(Some(*value)))
            .map(|(word, _)| word)
            .collect();
        if !rotary.is_empty() {
            self.output.emit(&format!("G91 G28 {}", rotary.join(" ")));
        }

        self.output.emit("G90");

        self.state.position = [None; 3];
        self.state.rotary = RotaryAngles::ZERO;
        self.state.motion = Some(MotionMode::Rapid);
    }

    fn load_tool(&mut self, line: usize) -> Result<(), TranslateError> {
        self.pending_load = false;
        let index = self.operation;
        let Some(tool) = self.registry.tool_for(index).cloned() else {
            return Ok(());
        };

        let settings = match tool.settings {
            Settings::Specified(settings) => settings,
            Settings::Unspecified => {
                return Err(TranslateError::UnknownToolName {
                    line,
                    name: tool.name().to_string(),
                })
            }
        };

        self.output.emit(&format!("T{} M06", tool.slot));
        if let Some(next) = self.registry.next_different_tool(index) {
            self.output.emit(&format!("T{}", next));
        }
        self.output.emit("M01");
        self.output.emit("G53 G00 Z0.0");
        self.output.emit(&format!("S{} M03", settings.speed));
        self.output.emit("G17 G54 G90");

        if self.profile.dynamic_work_offset {
            self.output.emit("G254");
            self.state.dynamic_offset = true;
        }

        self.state.tool = Some(tool.slot);
        self.state.motion = Some(MotionMode::Rapid);
        self.pending_compensation = Some(format!(
            "{} H{}",
            settings.compensation.code(),
            tool.offset()
        ));
        Ok(())
    }

    /// Part-frame point as the machine must be told it at `angles`.
    fn frame_position(&self, point: Point3<f64>, angles: RotaryAngles) -> Point3<f64> {
        if angles.is_zero() || self.profile.dynamic_work_offset {
            point
        } else {
            to_tool_frame(point, angles)
        }
    }

    fn linear_move(
        &mut self,
        target: &Coordinate,
        mode: MotionMode,
        feed: Option<f64>,
        line: usize,
    ) -> Result<(), TranslateError> {
        if self.pending_load {
            self.load_tool(line)?;
        }

        let angles = match target.direction {
            Some(direction) if is_vertical(&direction) => RotaryAngles::ZERO,
            Some(direction) => kinematics::solve_rotary(direction, &self.profile.b_axis)
                .map_err(|err| TranslateError::kinematics(err, line))?,
            None => self.state.rotary,
        };
        let position = self.frame_position(target.position, angles);

        let mut axes = Vec::new();
        for (axis, (letter, value)) in [('X', position.x), ('Y', position.y), ('Z', position.z)]
            .into_iter()
            .enumerate()
        {
            if differs(self.state.position[axis], value) {
                axes.push(axis_word(letter, value));
            }
        }
        if differs(Some(self.state.rotary.beta), angles.beta) {
            axes.push(axis_word('B', angles.beta));
        }
        if differs(Some(self.state.rotary.gamma), angles.gamma) {
            axes.push(axis_word('C', angles.gamma));
        }

        if axes.is_empty() && feed.is_none() {
            tracing::debug!(line, "move does not change machine position");
            return Ok(());
        }

        let mut words = Vec::new();
        if self.state.motion != Some(mode) {
            words.push(mode.code().to_string());
        }
        words.extend(self.pending_compensation.take());
        words.extend(axes);
        if let Some(feed) = feed {
            words.push(axis_word('F', feed));
        }
        self.output.emit(&words.join(" "));

        self.state.position = [Some(position.x), Some(position.y), Some(position.z)];
        self.state.rotary = angles;
        self.state.motion = Some(mode);
        Ok(())
    }

    /// Planar arc in the current rotary frame.
    ///
    /// A Z change along the arc is not interpolated: the Z move is made first
    /// as a straight feed, then the arc runs flat at the end height.
    fn circular_move(
        &mut self,
        circle: &Circle,
        end: &Coordinate,
        feed: Option<f64>,
        line: usize,
    ) -> Result<(), TranslateError> {
        if self.pending_load {
            self.load_tool(line)?;
        }

        let angles = self.state.rotary;
        let target = self.frame_position(end.position, angles);
        let center = self.frame_position(circle.center, angles);

        let (Some(start_x), Some(start_y)) = (self.state.position[0], self.state.position[1])
        else {
            return Err(TranslateError::ArcWithoutStart { line });
        };

        let direction = arc::resolve_direction(
            (start_x, start_y),
            (target.x, target.y),
            (center.x, center.y),
            circle.radius,
        );

        let mut feed = feed;

        if differs(self.state.position[2], target.z) {
            let mut words = Vec::new();
            if self.state.motion != Some(MotionMode::Linear) {
                words.push(MotionMode::Linear.code().to_string());
            }
            words.extend(self.pending_compensation.take());
            words.push(axis_word('Z', target.z));
            if let Some(feed) = feed.take() {
                words.push(axis_word('F', feed));
            }
            self.output.emit(&words.join(" "));

            self.state.position[2] = Some(target.z);
            self.state.motion = Some(MotionMode::Linear);
        }

        let mut words = vec![direction.code().to_string()];
        words.extend(self.pending_compensation.take());
        words.push(axis_word('X', target.x));
        words.push(axis_word('Y', target.y));
        words.push(axis_word('I', center.x - start_x));
        words.push(axis_word('J', center.y - start_y));
        if let Some(feed) = feed {
            words.push(axis_word('F', feed));
        }
        self.output.emit(&words.join(" "));

        self.state.position = [Some(target.x), Some(target.y), Some(target.z)];
        self.state.motion = Some(direction.into());
        Ok(())
    }

    fn end_of_path(&mut self) {
        self.output.emit("G255");
        self.state.dynamic_offset = false;
    }
}

/// Index, then emit.
pub fn translate(
    records: &[Record],
    profile: &MachineProfile,
) -> Result<GCodeOutput, TranslateError> {
    let translator = Translator::new(records, profile);
    let operations = translator.registry().operations.len();
    let tools = translator.registry().tools.len();

    let output = translator.run()?;

    tracing::info!(
        records = records.len(),
        operations,
        tools,
        blocks = output.blocks(),
        "translated toolpath"
    );
    Ok(output)
}

/// Parse a CLSF source and translate it.
pub fn translate_source(
    source: &str,
    profile: &MachineProfile,
) -> Result<GCodeOutput, TranslateError> {
    let records = parser::parse(source)?;
    translate(&records, profile)
}
