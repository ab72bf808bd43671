//! The primitive block catalog and the constructors that build the graph.
//!
//! Every block kind the compiler understands is a variant of [`BlockKind`],
//! carrying its compile-time properties. The constructors on
//! [`Circuit`] mirror the catalog one to one: each takes typed port
//! arguments (wires, literals, or nothing — see [`crate::wire`]) plus
//! properties and returns the output wires. Multi-output blocks return a
//! tuple with distinct node indices.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::graph::{Block, Circuit, Inputs};
use crate::script;
use crate::wire::{BoolInput, LinkInput, NumInput, SignalType, Wire};
use crate::Result;

/// The variable alphabet of fused function blocks, in allocation order.
pub(crate) const FUNCTION_VARS: [&str; 8] = ["x", "y", "z", "w", "a", "b", "c", "d"];

/// Input-port name for a fused-function variable.
pub(crate) fn var_port(var: &str) -> String {
    format!("{}_input", var)
}

/// When a pulse block emits its single-tick pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PulseMode {
    OffToOn,
    OnToOff,
    Always,
}

/// Unit of a variable timer's duration input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerUnit {
    Seconds,
    Ticks,
}

/// When a tooltip is shown in the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TooltipMode {
    Always,
    ErrorOnly,
}

/// One selectable entry of a dropdown property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropdownOption {
    pub label: String,
    pub value: f64,
}

/// Every primitive block kind, with its compile-time properties inline.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    Add,
    Subtract,
    Multiply,
    /// Two outputs: the quotient and a divide-by-zero flag.
    Divide,
    Modulo,
    Abs,
    Clamp { min: f64, max: f64 },
    ConstantNumber { value: f64 },
    /// Fused arithmetic function over up to eight named inputs.
    NumberFunction { body: String },
    Delta,

    Equal { epsilon: f64 },
    GreaterThan,
    LessThan,
    Threshold { min: f64, max: f64 },
    And,
    Or,
    Xor,
    Nand,
    Nor,
    Not,
    ConstantOn,
    /// Fused logic function over up to eight named inputs.
    BoolFunction { body: String },

    JkFlipFlop,
    SrLatch,
    PushToToggle,
    Pulse { mode: PulseMode },
    Blinker { on_duration: f64, off_duration: f64 },
    Capacitor { charge_time: f64, discharge_time: f64 },
    MemoryRegister { reset_value: f64 },
    UpDownCounter {
        increment: f64,
        reset_value: f64,
        min: f64,
        max: f64,
        clamp: bool,
    },
    TimerRtf { unit: TimerUnit },
    TimerRto { unit: TimerUnit },
    TimerTof { unit: TimerUnit },
    TimerTon { unit: TimerUnit },

    NumericalJunction,
    NumericalSwitchbox,
    AudioSwitchbox,
    CompositeSwitchbox,
    VideoSwitchbox,

    Pid { kp: f64, ki: f64, kd: f64 },
    PidAdvanced,

    /// Reads one channel; channel 0 means "use the dynamic channel input".
    CompositeReadNumber { channel: u8 },
    CompositeReadBoolean { channel: u8 },
    /// Writes channels starting at `start_channel`; 0 means dynamic.
    CompositeWriteNumber { start_channel: u8 },
    CompositeWriteBoolean { start_channel: u8 },
    CompositeBinaryToNumber,
    NumberToCompositeBinary,

    /// An embedded script, already verified and minified by the script hook.
    Script { source: String },

    PropertyNumber { name: String, value: f64 },
    PropertySlider {
        name: String,
        min: f64,
        max: f64,
        step: f64,
        value: f64,
    },
    PropertyToggle {
        name: String,
        on_label: String,
        off_label: String,
        value: bool,
    },
    PropertyDropdown {
        name: String,
        options: Vec<DropdownOption>,
        selected: usize,
    },
    PropertyText { name: String, value: String },

    TooltipNumber { label: String, mode: TooltipMode },
    TooltipBoolean {
        label: String,
        on_label: String,
        off_label: String,
        mode: TooltipMode,
    },
}

impl BlockKind {
    /// Stable kind id used by the document format.
    pub fn kind_id(&self) -> u32 {
        match self {
            BlockKind::Add => 1,
            BlockKind::Subtract => 2,
            BlockKind::Multiply => 3,
            BlockKind::Divide => 4,
            BlockKind::Modulo => 5,
            BlockKind::Abs => 6,
            BlockKind::Clamp { .. } => 7,
            BlockKind::ConstantNumber { .. } => 8,
            BlockKind::NumberFunction { .. } => 9,
            BlockKind::Delta => 10,
            BlockKind::Equal { .. } => 11,
            BlockKind::GreaterThan => 12,
            BlockKind::LessThan => 13,
            BlockKind::Threshold { .. } => 14,
            BlockKind::And => 15,
            BlockKind::Or => 16,
            BlockKind::Xor => 17,
            BlockKind::Nand => 18,
            BlockKind::Nor => 19,
            BlockKind::Not => 20,
            BlockKind::ConstantOn => 21,
            BlockKind::BoolFunction { .. } => 22,
            BlockKind::JkFlipFlop => 23,
            BlockKind::SrLatch => 24,
            BlockKind::PushToToggle => 25,
            BlockKind::Pulse { .. } => 26,
            BlockKind::Blinker { .. } => 27,
            BlockKind::Capacitor { .. } => 28,
            BlockKind::MemoryRegister { .. } => 29,
            BlockKind::UpDownCounter { .. } => 30,
            BlockKind::TimerRtf { .. } => 31,
            BlockKind::TimerRto { .. } => 32,
            BlockKind::TimerTof { .. } => 33,
            BlockKind::TimerTon { .. } => 34,
            BlockKind::NumericalJunction => 35,
            BlockKind::NumericalSwitchbox => 36,
            BlockKind::AudioSwitchbox => 37,
            BlockKind::CompositeSwitchbox => 38,
            BlockKind::VideoSwitchbox => 39,
            BlockKind::Pid { .. } => 40,
            BlockKind::PidAdvanced => 41,
            BlockKind::CompositeReadNumber { .. } => 42,
            BlockKind::CompositeReadBoolean { .. } => 43,
            BlockKind::CompositeWriteNumber { .. } => 44,
            BlockKind::CompositeWriteBoolean { .. } => 45,
            BlockKind::CompositeBinaryToNumber => 46,
            BlockKind::NumberToCompositeBinary => 47,
            BlockKind::Script { .. } => 48,
            BlockKind::PropertyNumber { .. } => 49,
            BlockKind::PropertySlider { .. } => 50,
            BlockKind::PropertyToggle { .. } => 51,
            BlockKind::PropertyDropdown { .. } => 52,
            BlockKind::PropertyText { .. } => 53,
            BlockKind::TooltipNumber { .. } => 54,
            BlockKind::TooltipBoolean { .. } => 55,
        }
    }

    /// Stable kind name used by the document format alongside the id.
    pub fn name(&self) -> &'static str {
        match self {
            BlockKind::Add => "add",
            BlockKind::Subtract => "subtract",
            BlockKind::Multiply => "multiply",
            BlockKind::Divide => "divide",
            BlockKind::Modulo => "modulo",
            BlockKind::Abs => "abs",
            BlockKind::Clamp { .. } => "clamp",
            BlockKind::ConstantNumber { .. } => "constant_number",
            BlockKind::NumberFunction { .. } => "number_function",
            BlockKind::Delta => "delta",
            BlockKind::Equal { .. } => "equal",
            BlockKind::GreaterThan => "greater_than",
            BlockKind::LessThan => "less_than",
            BlockKind::Threshold { .. } => "threshold",
            BlockKind::And => "and",
            BlockKind::Or => "or",
            BlockKind::Xor => "xor",
            BlockKind::Nand => "nand",
            BlockKind::Nor => "nor",
            BlockKind::Not => "not",
            BlockKind::ConstantOn => "constant_on",
            BlockKind::BoolFunction { .. } => "boolean_function",
            BlockKind::JkFlipFlop => "jk_flip_flop",
            BlockKind::SrLatch => "sr_latch",
            BlockKind::PushToToggle => "push_to_toggle",
            BlockKind::Pulse { .. } => "pulse",
            BlockKind::Blinker { .. } => "blinker",
            BlockKind::Capacitor { .. } => "capacitor",
            BlockKind::MemoryRegister { .. } => "memory_register",
            BlockKind::UpDownCounter { .. } => "up_down_counter",
            BlockKind::TimerRtf { .. } => "timer_rtf",
            BlockKind::TimerRto { .. } => "timer_rto",
            BlockKind::TimerTof { .. } => "timer_tof",
            BlockKind::TimerTon { .. } => "timer_ton",
            BlockKind::NumericalJunction => "numerical_junction",
            BlockKind::NumericalSwitchbox => "numerical_switchbox",
            BlockKind::AudioSwitchbox => "audio_switchbox",
            BlockKind::CompositeSwitchbox => "composite_switchbox",
            BlockKind::VideoSwitchbox => "video_switchbox",
            BlockKind::Pid { .. } => "pid",
            BlockKind::PidAdvanced => "pid_advanced",
            BlockKind::CompositeReadNumber { .. } => "composite_read_number",
            BlockKind::CompositeReadBoolean { .. } => "composite_read_boolean",
            BlockKind::CompositeWriteNumber { .. } => "composite_write_number",
            BlockKind::CompositeWriteBoolean { .. } => "composite_write_boolean",
            BlockKind::CompositeBinaryToNumber => "composite_binary_to_number",
            BlockKind::NumberToCompositeBinary => "number_to_composite_binary",
            BlockKind::Script { .. } => "script",
            BlockKind::PropertyNumber { .. } => "property_number",
            BlockKind::PropertySlider { .. } => "property_slider",
            BlockKind::PropertyToggle { .. } => "property_toggle",
            BlockKind::PropertyDropdown { .. } => "property_dropdown",
            BlockKind::PropertyText { .. } => "property_text",
            BlockKind::TooltipNumber { .. } => "tooltip_number",
            BlockKind::TooltipBoolean { .. } => "tooltip_boolean",
        }
    }

    /// The body of a fused function block, if this is one.
    pub fn function_body(&self) -> Option<&str> {
        match self {
            BlockKind::NumberFunction { body } | BlockKind::BoolFunction { body } => Some(body),
            _ => None,
        }
    }

    pub(crate) fn function_body_mut(&mut self) -> Option<&mut String> {
        match self {
            BlockKind::NumberFunction { body } | BlockKind::BoolFunction { body } => Some(body),
            _ => None,
        }
    }

    /// Whether this block is a user-tunable property component.
    pub fn is_property(&self) -> bool {
        matches!(
            self,
            BlockKind::PropertyNumber { .. }
                | BlockKind::PropertySlider { .. }
                | BlockKind::PropertyToggle { .. }
                | BlockKind::PropertyDropdown { .. }
                | BlockKind::PropertyText { .. }
        )
    }

    /// Serializer-friendly representation of the compile-time properties.
    pub fn properties(&self) -> Map<String, Value> {
        let value = match self {
            BlockKind::Clamp { min, max } => json!({ "min": min, "max": max }),
            BlockKind::ConstantNumber { value } => json!({ "value": value }),
            BlockKind::NumberFunction { body } | BlockKind::BoolFunction { body } => {
                json!({ "function": body })
            }
            BlockKind::Equal { epsilon } => json!({ "epsilon": epsilon }),
            BlockKind::Threshold { min, max } => json!({ "min": min, "max": max }),
            BlockKind::Pulse { mode } => json!({ "mode": mode }),
            BlockKind::Blinker {
                on_duration,
                off_duration,
            } => json!({ "on_duration": on_duration, "off_duration": off_duration }),
            BlockKind::Capacitor {
                charge_time,
                discharge_time,
            } => json!({ "charge_time": charge_time, "discharge_time": discharge_time }),
            BlockKind::MemoryRegister { reset_value } => json!({ "reset_value": reset_value }),
            BlockKind::UpDownCounter {
                increment,
                reset_value,
                min,
                max,
                clamp,
            } => json!({
                "increment": increment,
                "reset_value": reset_value,
                "min": min,
                "max": max,
                "clamp": clamp,
            }),
            BlockKind::TimerRtf { unit }
            | BlockKind::TimerRto { unit }
            | BlockKind::TimerTof { unit }
            | BlockKind::TimerTon { unit } => json!({ "unit": unit }),
            BlockKind::Pid { kp, ki, kd } => json!({ "kp": kp, "ki": ki, "kd": kd }),
            BlockKind::CompositeReadNumber { channel }
            | BlockKind::CompositeReadBoolean { channel } => json!({ "channel": channel }),
            BlockKind::CompositeWriteNumber { start_channel }
            | BlockKind::CompositeWriteBoolean { start_channel } => {
                json!({ "start_channel": start_channel })
            }
            BlockKind::Script { source } => json!({ "script": source }),
            BlockKind::PropertyNumber { name, value } => {
                json!({ "name": name, "value": value })
            }
            BlockKind::PropertySlider {
                name,
                min,
                max,
                step,
                value,
            } => json!({
                "name": name, "min": min, "max": max, "step": step, "value": value,
            }),
            BlockKind::PropertyToggle {
                name,
                on_label,
                off_label,
                value,
            } => json!({
                "name": name, "on_label": on_label, "off_label": off_label, "value": value,
            }),
            BlockKind::PropertyDropdown {
                name,
                options,
                selected,
            } => json!({ "name": name, "options": options, "selected": selected }),
            BlockKind::PropertyText { name, value } => json!({ "name": name, "value": value }),
            BlockKind::TooltipNumber { label, mode } => json!({ "label": label, "mode": mode }),
            BlockKind::TooltipBoolean {
                label,
                on_label,
                off_label,
                mode,
            } => json!({
                "label": label, "on_label": on_label, "off_label": off_label, "mode": mode,
            }),
            _ => json!({}),
        };
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

/// Render a number property the way it appears inside function bodies:
/// integral values print without a fractional part.
pub(crate) fn fmt_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn two_input(a: Wire, b: Wire) -> Inputs {
    let mut inputs = Inputs::new();
    inputs.set("a_input", a);
    inputs.set("b_input", b);
    inputs
}

impl Circuit {
    fn number_pair(
        &mut self,
        kind: BlockKind,
        a: impl Into<NumInput>,
        b: impl Into<NumInput>,
        out: SignalType,
    ) -> Wire {
        let a = self.number_input(a);
        let b = self.number_input(b);
        self.block_wire(out, Block::new(kind, two_input(a, b)))
    }

    fn boolean_pair(
        &mut self,
        kind: BlockKind,
        a: impl Into<BoolInput>,
        b: impl Into<BoolInput>,
    ) -> Wire {
        let a = self.boolean_input(a);
        let b = self.boolean_input(b);
        self.block_wire(SignalType::Boolean, Block::new(kind, two_input(a, b)))
    }

    // ---------------------------------------------------------------------
    // Arithmetic
    // ---------------------------------------------------------------------

    /// Adds the two input values.
    pub fn add(&mut self, a: impl Into<NumInput>, b: impl Into<NumInput>) -> Wire {
        self.number_pair(BlockKind::Add, a, b, SignalType::Number)
    }

    /// Subtracts the second input from the first.
    pub fn sub(&mut self, a: impl Into<NumInput>, b: impl Into<NumInput>) -> Wire {
        self.number_pair(BlockKind::Subtract, a, b, SignalType::Number)
    }

    /// Multiplies the two input values.
    pub fn mul(&mut self, a: impl Into<NumInput>, b: impl Into<NumInput>) -> Wire {
        self.number_pair(BlockKind::Multiply, a, b, SignalType::Number)
    }

    /// Divides the first input by the second. Returns the quotient and a
    /// flag raised while dividing by zero.
    pub fn div(&mut self, a: impl Into<NumInput>, b: impl Into<NumInput>) -> (Wire, Wire) {
        let a = self.number_input(a);
        let b = self.number_input(b);
        let id = self.insert_block(Block::new(BlockKind::Divide, two_input(a, b)));
        let quotient = self.fresh_wire(SignalType::Number, id, 0);
        let by_zero = self.fresh_wire(SignalType::Boolean, id, 1);
        (quotient, by_zero)
    }

    /// The modulo of input A by input B.
    pub fn modulo(&mut self, a: impl Into<NumInput>, b: impl Into<NumInput>) -> Wire {
        self.number_pair(BlockKind::Modulo, a, b, SignalType::Number)
    }

    /// Absolute value of the input.
    pub fn abs(&mut self, a: impl Into<NumInput>) -> Wire {
        let a = self.number_input(a);
        let mut inputs = Inputs::new();
        inputs.set("number_input", a);
        self.block_wire(SignalType::Number, Block::new(BlockKind::Abs, inputs))
    }

    /// Clamps the input between a fixed min and max (a clamp block with
    /// properties; see [`Circuit::clamp_wires`] for the variable form).
    pub fn clamp(&mut self, a: impl Into<NumInput>, min: f64, max: f64) -> Wire {
        let a = self.number_input(a);
        let mut inputs = Inputs::new();
        inputs.set("number_input", a);
        self.block_wire(
            SignalType::Number,
            Block::new(BlockKind::Clamp { min, max }, inputs),
        )
    }

    /// A constant number set as a property.
    pub fn constant_number(&mut self, value: f64) -> Wire {
        self.block_wire(
            SignalType::Number,
            Block::new(BlockKind::ConstantNumber { value }, Inputs::new()),
        )
    }

    /// Difference between the current and previous input value.
    pub fn delta(&mut self, value: impl Into<NumInput>) -> Wire {
        let value = self.number_input(value);
        let mut inputs = Inputs::new();
        inputs.set("value_input", value);
        self.block_wire(SignalType::Number, Block::new(BlockKind::Delta, inputs))
    }

    /// A fused arithmetic function over up to eight inputs, bound to the
    /// variables `x y z w a b c d` in order.
    pub fn number_function(
        &mut self,
        body: impl Into<String>,
        args: impl IntoIterator<Item = NumInput>,
    ) -> Wire {
        let mut inputs = Inputs::new();
        let mut args = args.into_iter();
        for var in FUNCTION_VARS {
            let wire = self.number_input(args.next().unwrap_or(NumInput::None));
            inputs.set(var_port(var), wire);
        }
        assert!(args.next().is_none(), "at most 8 function inputs");
        self.block_wire(
            SignalType::Number,
            Block::new(BlockKind::NumberFunction { body: body.into() }, inputs),
        )
    }

    /// A fused logic function over up to eight inputs.
    pub fn boolean_function(
        &mut self,
        body: impl Into<String>,
        args: impl IntoIterator<Item = BoolInput>,
    ) -> Wire {
        let mut inputs = Inputs::new();
        let mut args = args.into_iter();
        for var in FUNCTION_VARS {
            let wire = self.boolean_input(args.next().unwrap_or(BoolInput::None));
            inputs.set(var_port(var), wire);
        }
        assert!(args.next().is_none(), "at most 8 function inputs");
        self.block_wire(
            SignalType::Boolean,
            Block::new(BlockKind::BoolFunction { body: body.into() }, inputs),
        )
    }

    // ---------------------------------------------------------------------
    // Comparison and logic
    // ---------------------------------------------------------------------

    /// On while the two numbers are exactly equal.
    pub fn equal(&mut self, a: impl Into<NumInput>, b: impl Into<NumInput>) -> Wire {
        self.equal_within(a, b, 0.0)
    }

    /// On while the two numbers are equal within `epsilon`.
    pub fn equal_within(
        &mut self,
        a: impl Into<NumInput>,
        b: impl Into<NumInput>,
        epsilon: f64,
    ) -> Wire {
        self.number_pair(BlockKind::Equal { epsilon }, a, b, SignalType::Boolean)
    }

    /// On while the two numbers differ.
    pub fn not_equal(&mut self, a: impl Into<NumInput>, b: impl Into<NumInput>) -> Wire {
        let eq = self.equal(a, b);
        self.not(eq)
    }

    /// On while the first input exceeds the second.
    pub fn greater_than(&mut self, a: impl Into<NumInput>, b: impl Into<NumInput>) -> Wire {
        self.number_pair(BlockKind::GreaterThan, a, b, SignalType::Boolean)
    }

    /// On while the first input is below the second.
    pub fn less_than(&mut self, a: impl Into<NumInput>, b: impl Into<NumInput>) -> Wire {
        self.number_pair(BlockKind::LessThan, a, b, SignalType::Boolean)
    }

    /// On while the first input is at least the second.
    pub fn greater_equal(&mut self, a: impl Into<NumInput>, b: impl Into<NumInput>) -> Wire {
        let a = self.number_input(a);
        let b = self.number_input(b);
        let gt = self.greater_than(a, b);
        let eq = self.equal(a, b);
        self.or(gt, eq)
    }

    /// On while the first input is at most the second.
    pub fn less_equal(&mut self, a: impl Into<NumInput>, b: impl Into<NumInput>) -> Wire {
        let a = self.number_input(a);
        let b = self.number_input(b);
        let lt = self.less_than(a, b);
        let eq = self.equal(a, b);
        self.or(lt, eq)
    }

    /// On while the input lies inside the fixed threshold band.
    pub fn threshold(&mut self, value: impl Into<NumInput>, min: f64, max: f64) -> Wire {
        let value = self.number_input(value);
        let mut inputs = Inputs::new();
        inputs.set("number_input", value);
        self.block_wire(
            SignalType::Boolean,
            Block::new(BlockKind::Threshold { min, max }, inputs),
        )
    }

    pub fn and(&mut self, a: impl Into<BoolInput>, b: impl Into<BoolInput>) -> Wire {
        self.boolean_pair(BlockKind::And, a, b)
    }

    pub fn or(&mut self, a: impl Into<BoolInput>, b: impl Into<BoolInput>) -> Wire {
        self.boolean_pair(BlockKind::Or, a, b)
    }

    pub fn xor(&mut self, a: impl Into<BoolInput>, b: impl Into<BoolInput>) -> Wire {
        self.boolean_pair(BlockKind::Xor, a, b)
    }

    pub fn nand(&mut self, a: impl Into<BoolInput>, b: impl Into<BoolInput>) -> Wire {
        self.boolean_pair(BlockKind::Nand, a, b)
    }

    pub fn nor(&mut self, a: impl Into<BoolInput>, b: impl Into<BoolInput>) -> Wire {
        self.boolean_pair(BlockKind::Nor, a, b)
    }

    pub fn not(&mut self, a: impl Into<BoolInput>) -> Wire {
        let a = self.boolean_input(a);
        let mut inputs = Inputs::new();
        inputs.set("a_input", a);
        self.block_wire(SignalType::Boolean, Block::new(BlockKind::Not, inputs))
    }

    /// A constant on signal.
    pub fn constant_on(&mut self) -> Wire {
        self.block_wire(
            SignalType::Boolean,
            Block::new(BlockKind::ConstantOn, Inputs::new()),
        )
    }

    // ---------------------------------------------------------------------
    // State and time
    // ---------------------------------------------------------------------

    /// A JK flip flop. Returns `(q, not_q)`.
    pub fn jk_flip_flop(
        &mut self,
        set: impl Into<BoolInput>,
        reset: impl Into<BoolInput>,
    ) -> (Wire, Wire) {
        self.latch(BlockKind::JkFlipFlop, set, reset)
    }

    /// An SR latch. Returns `(q, not_q)`.
    pub fn sr_latch(
        &mut self,
        set: impl Into<BoolInput>,
        reset: impl Into<BoolInput>,
    ) -> (Wire, Wire) {
        self.latch(BlockKind::SrLatch, set, reset)
    }

    fn latch(
        &mut self,
        kind: BlockKind,
        set: impl Into<BoolInput>,
        reset: impl Into<BoolInput>,
    ) -> (Wire, Wire) {
        let set = self.boolean_input(set);
        let reset = self.boolean_input(reset);
        let mut inputs = Inputs::new();
        inputs.set("set_input", set);
        inputs.set("reset_input", reset);
        let id = self.insert_block(Block::new(kind, inputs));
        let q = self.fresh_wire(SignalType::Boolean, id, 0);
        let not_q = self.fresh_wire(SignalType::Boolean, id, 1);
        (q, not_q)
    }

    /// An on/off switch toggled by every new on signal.
    pub fn push_to_toggle(&mut self, toggle: impl Into<BoolInput>) -> Wire {
        let toggle = self.boolean_input(toggle);
        let mut inputs = Inputs::new();
        inputs.set("a_input", toggle);
        self.block_wire(
            SignalType::Boolean,
            Block::new(BlockKind::PushToToggle, inputs),
        )
    }

    /// Emits a single-tick pulse on the configured edge of its input.
    pub fn pulse(&mut self, toggle: impl Into<BoolInput>, mode: PulseMode) -> Wire {
        let toggle = self.boolean_input(toggle);
        let mut inputs = Inputs::new();
        inputs.set("toggle_signal_input", toggle);
        self.block_wire(
            SignalType::Boolean,
            Block::new(BlockKind::Pulse { mode }, inputs),
        )
    }

    /// Blinks between on and off at a fixed rate while controlled on.
    pub fn blinker(
        &mut self,
        control: impl Into<BoolInput>,
        on_duration: f64,
        off_duration: f64,
    ) -> Wire {
        let control = self.boolean_input(control);
        let mut inputs = Inputs::new();
        inputs.set("control_signal_input", control);
        self.block_wire(
            SignalType::Boolean,
            Block::new(
                BlockKind::Blinker {
                    on_duration,
                    off_duration,
                },
                inputs,
            ),
        )
    }

    /// Charges while receiving an on signal, then discharges over time.
    pub fn capacitor(
        &mut self,
        charge: impl Into<BoolInput>,
        charge_time: f64,
        discharge_time: f64,
    ) -> Wire {
        let charge = self.boolean_input(charge);
        let mut inputs = Inputs::new();
        inputs.set("charge_input", charge);
        self.block_wire(
            SignalType::Boolean,
            Block::new(
                BlockKind::Capacitor {
                    charge_time,
                    discharge_time,
                },
                inputs,
            ),
        )
    }

    /// Stores the data input on set; reset clears to a fixed value.
    pub fn memory_register(
        &mut self,
        set: impl Into<BoolInput>,
        reset: impl Into<BoolInput>,
        data: impl Into<NumInput>,
        reset_value: f64,
    ) -> Wire {
        let set = self.boolean_input(set);
        let reset = self.boolean_input(reset);
        let data = self.number_input(data);
        let mut inputs = Inputs::new();
        inputs.set("set_input", set);
        inputs.set("reset_input", reset);
        inputs.set("number_to_store_input", data);
        self.block_wire(
            SignalType::Number,
            Block::new(BlockKind::MemoryRegister { reset_value }, inputs),
        )
    }

    /// An internal value stepped up and down by its inputs.
    #[allow(clippy::too_many_arguments)]
    pub fn up_down_counter(
        &mut self,
        up: impl Into<BoolInput>,
        down: impl Into<BoolInput>,
        reset: impl Into<BoolInput>,
        increment: f64,
        reset_value: f64,
        min: f64,
        max: f64,
        clamp: bool,
    ) -> Wire {
        let up = self.boolean_input(up);
        let down = self.boolean_input(down);
        let reset = self.boolean_input(reset);
        let mut inputs = Inputs::new();
        inputs.set("up_input", up);
        inputs.set("down_input", down);
        inputs.set("reset_input", reset);
        self.block_wire(
            SignalType::Number,
            Block::new(
                BlockKind::UpDownCounter {
                    increment,
                    reset_value,
                    min,
                    max,
                    clamp,
                },
                inputs,
            ),
        )
    }

    /// Variable timer, on while below its duration; resets on signal.
    pub fn timer_rtf(
        &mut self,
        enable: impl Into<BoolInput>,
        duration: impl Into<NumInput>,
        reset: impl Into<BoolInput>,
        unit: TimerUnit,
    ) -> Wire {
        self.timer_with_reset(BlockKind::TimerRtf { unit }, enable, duration, reset)
    }

    /// Variable timer, on once it reaches its duration; resets on signal.
    pub fn timer_rto(
        &mut self,
        enable: impl Into<BoolInput>,
        duration: impl Into<NumInput>,
        reset: impl Into<BoolInput>,
        unit: TimerUnit,
    ) -> Wire {
        self.timer_with_reset(BlockKind::TimerRto { unit }, enable, duration, reset)
    }

    /// Variable timer, on while below its duration; resets when off.
    pub fn timer_tof(
        &mut self,
        enable: impl Into<BoolInput>,
        duration: impl Into<NumInput>,
        unit: TimerUnit,
    ) -> Wire {
        self.timer_plain(BlockKind::TimerTof { unit }, enable, duration)
    }

    /// Variable timer, on once it reaches its duration; resets when off.
    pub fn timer_ton(
        &mut self,
        enable: impl Into<BoolInput>,
        duration: impl Into<NumInput>,
        unit: TimerUnit,
    ) -> Wire {
        self.timer_plain(BlockKind::TimerTon { unit }, enable, duration)
    }

    fn timer_with_reset(
        &mut self,
        kind: BlockKind,
        enable: impl Into<BoolInput>,
        duration: impl Into<NumInput>,
        reset: impl Into<BoolInput>,
    ) -> Wire {
        let enable = self.boolean_input(enable);
        let duration = self.number_input(duration);
        let reset = self.boolean_input(reset);
        let mut inputs = Inputs::new();
        inputs.set("timer_enable_input", enable);
        inputs.set("duration_input", duration);
        inputs.set("reset_input", reset);
        self.block_wire(SignalType::Boolean, Block::new(kind, inputs))
    }

    fn timer_plain(
        &mut self,
        kind: BlockKind,
        enable: impl Into<BoolInput>,
        duration: impl Into<NumInput>,
    ) -> Wire {
        let enable = self.boolean_input(enable);
        let duration = self.number_input(duration);
        let mut inputs = Inputs::new();
        inputs.set("timer_enable_input", enable);
        inputs.set("duration_input", duration);
        self.block_wire(SignalType::Boolean, Block::new(kind, inputs))
    }

    // ---------------------------------------------------------------------
    // Routing
    // ---------------------------------------------------------------------

    /// Routes the input to one of two outputs depending on the switch
    /// signal; the path not taken outputs zero.
    pub fn numerical_junction(
        &mut self,
        value: impl Into<NumInput>,
        switch: impl Into<BoolInput>,
    ) -> (Wire, Wire) {
        let value = self.number_input(value);
        let switch = self.boolean_input(switch);
        let mut inputs = Inputs::new();
        inputs.set("value_to_pass_through_input", value);
        inputs.set("switch_signal_input", switch);
        let id = self.insert_block(Block::new(BlockKind::NumericalJunction, inputs));
        let on_path = self.fresh_wire(SignalType::Number, id, 0);
        let off_path = self.fresh_wire(SignalType::Number, id, 1);
        (on_path, off_path)
    }

    /// Outputs the first value on an on signal, the second otherwise.
    pub fn numerical_switchbox(
        &mut self,
        on_value: impl Into<NumInput>,
        off_value: impl Into<NumInput>,
        switch: impl Into<BoolInput>,
    ) -> Wire {
        let on_value = self.number_input(on_value);
        let off_value = self.number_input(off_value);
        let switch = self.boolean_input(switch);
        self.switchbox_with(
            BlockKind::NumericalSwitchbox,
            SignalType::Number,
            on_value,
            off_value,
            switch,
        )
    }

    pub fn audio_switchbox(
        &mut self,
        on_value: impl Into<LinkInput>,
        off_value: impl Into<LinkInput>,
        switch: impl Into<BoolInput>,
    ) -> Wire {
        let on_value = self.link_input(SignalType::Audio, on_value);
        let off_value = self.link_input(SignalType::Audio, off_value);
        let switch = self.boolean_input(switch);
        self.switchbox_with(
            BlockKind::AudioSwitchbox,
            SignalType::Audio,
            on_value,
            off_value,
            switch,
        )
    }

    pub fn composite_switchbox(
        &mut self,
        on_value: impl Into<LinkInput>,
        off_value: impl Into<LinkInput>,
        switch: impl Into<BoolInput>,
    ) -> Wire {
        let on_value = self.link_input(SignalType::Composite, on_value);
        let off_value = self.link_input(SignalType::Composite, off_value);
        let switch = self.boolean_input(switch);
        self.switchbox_with(
            BlockKind::CompositeSwitchbox,
            SignalType::Composite,
            on_value,
            off_value,
            switch,
        )
    }

    pub fn video_switchbox(
        &mut self,
        on_value: impl Into<LinkInput>,
        off_value: impl Into<LinkInput>,
        switch: impl Into<BoolInput>,
    ) -> Wire {
        let on_value = self.link_input(SignalType::Video, on_value);
        let off_value = self.link_input(SignalType::Video, off_value);
        let switch = self.boolean_input(switch);
        self.switchbox_with(
            BlockKind::VideoSwitchbox,
            SignalType::Video,
            on_value,
            off_value,
            switch,
        )
    }

    fn switchbox_with(
        &mut self,
        kind: BlockKind,
        ty: SignalType,
        on_value: Wire,
        off_value: Wire,
        switch: Wire,
    ) -> Wire {
        let mut inputs = Inputs::new();
        inputs.set("on_value_input", on_value);
        inputs.set("off_value_input", off_value);
        inputs.set("switch_signal_input", switch);
        self.block_wire(ty, Block::new(kind, inputs))
    }

    /// Dispatches a switch to the right switchbox for the payload type.
    /// Boolean payloads are synthesized from gates.
    ///
    /// # Panics
    ///
    /// Panics if `switch` is not boolean or the payload types differ.
    pub fn switch(&mut self, switch: Wire, on_value: Wire, off_value: Wire) -> Wire {
        assert_eq!(
            switch.signal_type(),
            SignalType::Boolean,
            "wire type mismatch: expected boolean, got {}",
            switch.signal_type()
        );
        assert_eq!(
            on_value.signal_type(),
            off_value.signal_type(),
            "switch arms must share a type"
        );
        match on_value.signal_type() {
            SignalType::Number => self.numerical_switchbox(on_value, off_value, switch),
            SignalType::Audio => self.audio_switchbox(on_value, off_value, switch),
            SignalType::Composite => self.composite_switchbox(on_value, off_value, switch),
            SignalType::Video => self.video_switchbox(on_value, off_value, switch),
            SignalType::Boolean => {
                let on_path = self.and(switch, on_value);
                let inverted = self.not(switch);
                let off_path = self.and(inverted, off_value);
                self.or(on_path, off_path)
            }
        }
    }

    // ---------------------------------------------------------------------
    // Control
    // ---------------------------------------------------------------------

    /// A basic PID controller with fixed gains.
    pub fn pid(
        &mut self,
        setpoint: impl Into<NumInput>,
        process_variable: impl Into<NumInput>,
        active: impl Into<BoolInput>,
        kp: f64,
        ki: f64,
        kd: f64,
    ) -> Wire {
        let setpoint = self.number_input(setpoint);
        let process_variable = self.number_input(process_variable);
        let active = self.boolean_input(active);
        let mut inputs = Inputs::new();
        inputs.set("setpoint_input", setpoint);
        inputs.set("process_variable_input", process_variable);
        inputs.set("active_input", active);
        self.block_wire(
            SignalType::Number,
            Block::new(BlockKind::Pid { kp, ki, kd }, inputs),
        )
    }

    /// A PID controller with variable gains.
    pub fn advanced_pid(
        &mut self,
        setpoint: impl Into<NumInput>,
        process_variable: impl Into<NumInput>,
        proportional: impl Into<NumInput>,
        integral: impl Into<NumInput>,
        derivative: impl Into<NumInput>,
        active: impl Into<BoolInput>,
    ) -> Wire {
        let setpoint = self.number_input(setpoint);
        let process_variable = self.number_input(process_variable);
        let proportional = self.number_input(proportional);
        let integral = self.number_input(integral);
        let derivative = self.number_input(derivative);
        let active = self.boolean_input(active);
        let mut inputs = Inputs::new();
        inputs.set("setpoint_input", setpoint);
        inputs.set("process_variable_input", process_variable);
        inputs.set("proportional_input", proportional);
        inputs.set("integral_input", integral);
        inputs.set("derivative_input", derivative);
        inputs.set("active_input", active);
        self.block_wire(SignalType::Number, Block::new(BlockKind::PidAdvanced, inputs))
    }

    // ---------------------------------------------------------------------
    // Composite
    // ---------------------------------------------------------------------

    fn check_channel(channel: u8) {
        assert!(
            (1..=32).contains(&channel),
            "composite channel must be in 1..=32, got {}",
            channel
        );
    }

    /// Reads the number value of one channel of a composite signal.
    pub fn composite_read_number(
        &mut self,
        composite: impl Into<LinkInput>,
        channel: u8,
    ) -> Wire {
        Self::check_channel(channel);
        self.composite_read(BlockKind::CompositeReadNumber { channel }, composite, None)
    }

    /// Reads the number value of the channel selected by a wire.
    pub fn composite_read_number_dynamic(
        &mut self,
        composite: impl Into<LinkInput>,
        channel: impl Into<NumInput>,
    ) -> Wire {
        let channel = self.number_input(channel);
        self.composite_read(
            BlockKind::CompositeReadNumber { channel: 0 },
            composite,
            Some(channel),
        )
    }

    /// Reads the on/off value of one channel of a composite signal.
    pub fn composite_read_boolean(
        &mut self,
        composite: impl Into<LinkInput>,
        channel: u8,
    ) -> Wire {
        Self::check_channel(channel);
        self.composite_read(BlockKind::CompositeReadBoolean { channel }, composite, None)
    }

    /// Reads the on/off value of the channel selected by a wire.
    pub fn composite_read_boolean_dynamic(
        &mut self,
        composite: impl Into<LinkInput>,
        channel: impl Into<NumInput>,
    ) -> Wire {
        let channel = self.number_input(channel);
        self.composite_read(
            BlockKind::CompositeReadBoolean { channel: 0 },
            composite,
            Some(channel),
        )
    }

    fn composite_read(
        &mut self,
        kind: BlockKind,
        composite: impl Into<LinkInput>,
        dynamic: Option<Wire>,
    ) -> Wire {
        let composite = self.link_input(SignalType::Composite, composite);
        let start = match dynamic {
            Some(wire) => wire,
            None => self.unconnected(SignalType::Number),
        };
        let out = match kind {
            BlockKind::CompositeReadBoolean { .. } => SignalType::Boolean,
            _ => SignalType::Number,
        };
        let mut inputs = Inputs::new();
        inputs.set("composite_signal_input", composite);
        inputs.set("start_channel_input", start);
        self.block_wire(out, Block::new(kind, inputs))
    }

    /// A composite equal to its input with number channels replaced.
    /// Channel numbers must be in 1..=32; unlisted channels pass through.
    pub fn composite_write_number(
        &mut self,
        composite: impl Into<LinkInput>,
        channels: &[(u8, NumInput)],
    ) -> Wire {
        let composite = self.link_input(SignalType::Composite, composite);
        let mut bound: Vec<(u8, Wire)> = Vec::with_capacity(channels.len());
        for &(channel, value) in channels {
            Self::check_channel(channel);
            bound.push((channel, self.number_input(value)));
        }
        self.composite_write(
            BlockKind::CompositeWriteNumber { start_channel: 1 },
            SignalType::Number,
            composite,
            &bound,
            None,
        )
    }

    /// A composite equal to its input with on/off channels replaced.
    pub fn composite_write_boolean(
        &mut self,
        composite: impl Into<LinkInput>,
        channels: &[(u8, BoolInput)],
    ) -> Wire {
        let composite = self.link_input(SignalType::Composite, composite);
        let mut bound: Vec<(u8, Wire)> = Vec::with_capacity(channels.len());
        for &(channel, value) in channels {
            Self::check_channel(channel);
            bound.push((channel, self.boolean_input(value)));
        }
        self.composite_write(
            BlockKind::CompositeWriteBoolean { start_channel: 1 },
            SignalType::Boolean,
            composite,
            &bound,
            None,
        )
    }

    /// Writes number channels at a position selected by a wire.
    pub fn composite_write_number_dynamic(
        &mut self,
        composite: impl Into<LinkInput>,
        start_channel: impl Into<NumInput>,
        values: &[(u8, NumInput)],
    ) -> Wire {
        let composite = self.link_input(SignalType::Composite, composite);
        let start = self.number_input(start_channel);
        let mut bound: Vec<(u8, Wire)> = Vec::with_capacity(values.len());
        for &(channel, value) in values {
            Self::check_channel(channel);
            bound.push((channel, self.number_input(value)));
        }
        self.composite_write(
            BlockKind::CompositeWriteNumber { start_channel: 0 },
            SignalType::Number,
            composite,
            &bound,
            Some(start),
        )
    }

    /// Writes on/off channels at a position selected by a wire.
    pub fn composite_write_boolean_dynamic(
        &mut self,
        composite: impl Into<LinkInput>,
        start_channel: impl Into<NumInput>,
        values: &[(u8, BoolInput)],
    ) -> Wire {
        let composite = self.link_input(SignalType::Composite, composite);
        let start = self.number_input(start_channel);
        let mut bound: Vec<(u8, Wire)> = Vec::with_capacity(values.len());
        for &(channel, value) in values {
            Self::check_channel(channel);
            bound.push((channel, self.boolean_input(value)));
        }
        self.composite_write(
            BlockKind::CompositeWriteBoolean { start_channel: 0 },
            SignalType::Boolean,
            composite,
            &bound,
            Some(start),
        )
    }

    fn composite_write(
        &mut self,
        kind: BlockKind,
        channel_ty: SignalType,
        composite: Wire,
        channels: &[(u8, Wire)],
        dynamic: Option<Wire>,
    ) -> Wire {
        let start = match dynamic {
            Some(wire) => wire,
            None => self.unconnected(SignalType::Number),
        };
        let mut inputs = Inputs::new();
        inputs.set("composite_signal_input", composite);
        inputs.set("start_channel_input", start);
        for channel in 1..=32u8 {
            let wire = match channels.iter().find(|&&(c, _)| c == channel) {
                Some(&(_, wire)) => wire,
                None => self.unconnected(channel_ty),
            };
            inputs.set(format!("channel_{}_input", channel), wire);
        }
        self.block_wire(SignalType::Composite, Block::new(kind, inputs))
    }

    /// In-place form of the composite write: rebinds `composite` to a new
    /// write block carrying the given number channel.
    pub fn set_number_channel(
        &mut self,
        composite: &mut Wire,
        channel: u8,
        value: impl Into<NumInput>,
    ) {
        self.warn_if_mixed_write_apis(composite.producer());
        *composite = self.composite_write_number(*composite, &[(channel, value.into())]);
    }

    /// In-place form of the composite write for on/off channels.
    pub fn set_boolean_channel(
        &mut self,
        composite: &mut Wire,
        channel: u8,
        value: impl Into<BoolInput>,
    ) {
        self.warn_if_mixed_write_apis(composite.producer());
        *composite = self.composite_write_boolean(*composite, &[(channel, value.into())]);
    }

    /// Value-returning multi-channel write, tracked so later in-place
    /// assignments on the same producer can warn about mixed APIs.
    pub fn with_number_channels(
        &mut self,
        composite: Wire,
        channels: &[(u8, NumInput)],
    ) -> Wire {
        self.note_written_via_value_api(composite.producer());
        self.composite_write_number(composite, channels)
    }

    /// Reads the on/off channels of a composite as the bits of a number.
    pub fn composite_binary_to_number(&mut self, value: impl Into<LinkInput>) -> Wire {
        let value = self.link_input(SignalType::Composite, value);
        let mut inputs = Inputs::new();
        inputs.set("signal_to_convert_input", value);
        self.block_wire(
            SignalType::Number,
            Block::new(BlockKind::CompositeBinaryToNumber, inputs),
        )
    }

    /// Converts a rounded number to on/off bits on a composite.
    pub fn number_to_composite_binary(&mut self, value: impl Into<NumInput>) -> Wire {
        let value = self.number_input(value);
        let mut inputs = Inputs::new();
        inputs.set("number_to_convert_input", value);
        self.block_wire(
            SignalType::Composite,
            Block::new(BlockKind::NumberToCompositeBinary, inputs),
        )
    }

    // ---------------------------------------------------------------------
    // Scripts
    // ---------------------------------------------------------------------

    /// An embedded script processing composite and video inputs. The source
    /// is run through the verify hook, which may minify it; the returned
    /// wires are the script's composite and video outputs.
    pub fn script(
        &mut self,
        source: &str,
        composite: impl Into<LinkInput>,
        video: impl Into<LinkInput>,
    ) -> Result<(Wire, Wire)> {
        let source = script::verify_script(source, true)?;
        let composite = self.link_input(SignalType::Composite, composite);
        let video = self.link_input(SignalType::Video, video);
        let mut inputs = Inputs::new();
        inputs.set("data_input", composite);
        inputs.set("video_input", video);
        let id = self.insert_block(Block::new(BlockKind::Script { source }, inputs));
        let data_out = self.fresh_wire(SignalType::Composite, id, 0);
        let video_out = self.fresh_wire(SignalType::Video, id, 1);
        Ok((data_out, video_out))
    }

    /// Embeds a script read from a file. See [`Circuit::script`].
    pub fn script_from_file(
        &mut self,
        path: impl AsRef<std::path::Path>,
        composite: impl Into<LinkInput>,
        video: impl Into<LinkInput>,
    ) -> Result<(Wire, Wire)> {
        let source = std::fs::read_to_string(path)?;
        self.script(&source, composite, video)
    }

    // ---------------------------------------------------------------------
    // Properties
    // ---------------------------------------------------------------------

    /// A number property settable in the microcontroller properties.
    pub fn property_number(&mut self, name: impl Into<String>, value: f64) -> Wire {
        self.block_wire(
            SignalType::Number,
            Block::new(
                BlockKind::PropertyNumber {
                    name: name.into(),
                    value,
                },
                Inputs::new(),
            ),
        )
    }

    /// A slider property. The default must lie inside `[min, max]`.
    ///
    /// # Panics
    ///
    /// Panics if `value` lies outside the slider range.
    pub fn property_slider(
        &mut self,
        name: impl Into<String>,
        min: f64,
        max: f64,
        step: f64,
        value: f64,
    ) -> Wire {
        assert!(
            min <= value && value <= max,
            "slider default {} outside [{}, {}]",
            value,
            min,
            max
        );
        self.block_wire(
            SignalType::Number,
            Block::new(
                BlockKind::PropertySlider {
                    name: name.into(),
                    min,
                    max,
                    step,
                    value,
                },
                Inputs::new(),
            ),
        )
    }

    /// A toggle property.
    pub fn property_toggle(
        &mut self,
        name: impl Into<String>,
        on_label: impl Into<String>,
        off_label: impl Into<String>,
        value: bool,
    ) -> Wire {
        self.block_wire(
            SignalType::Boolean,
            Block::new(
                BlockKind::PropertyToggle {
                    name: name.into(),
                    on_label: on_label.into(),
                    off_label: off_label.into(),
                    value,
                },
                Inputs::new(),
            ),
        )
    }

    /// A dropdown property mapping labels to numeric values.
    ///
    /// # Panics
    ///
    /// Panics if `default` is not one of the option labels.
    pub fn property_dropdown(
        &mut self,
        name: impl Into<String>,
        options: &[(&str, f64)],
        default: &str,
    ) -> Wire {
        let selected = options
            .iter()
            .position(|&(label, _)| label == default)
            .unwrap_or_else(|| panic!("default value \"{}\" not in options", default));
        let options = options
            .iter()
            .map(|&(label, value)| DropdownOption {
                label: label.to_string(),
                value,
            })
            .collect();
        self.block_wire(
            SignalType::Number,
            Block::new(
                BlockKind::PropertyDropdown {
                    name: name.into(),
                    options,
                    selected,
                },
                Inputs::new(),
            ),
        )
    }

    // ---------------------------------------------------------------------
    // Expression shorthands
    // ---------------------------------------------------------------------

    /// `-a`, built as a subtraction from an open input.
    pub fn neg(&mut self, a: impl Into<NumInput>) -> Wire {
        let open = self.unconnected(SignalType::Number);
        let a = self.number_input(a);
        self.sub(open, a)
    }

    /// `a ^ b` as a fused function.
    pub fn pow(&mut self, a: impl Into<NumInput>, b: impl Into<NumInput>) -> Wire {
        self.number_function("x^y", [a.into(), b.into()])
    }

    /// `a * 2^b` as a fused function.
    pub fn shl(&mut self, a: impl Into<NumInput>, b: impl Into<NumInput>) -> Wire {
        self.number_function("x*2^y", [a.into(), b.into()])
    }

    /// `a / 2^b` as a fused function.
    pub fn shr(&mut self, a: impl Into<NumInput>, b: impl Into<NumInput>) -> Wire {
        self.number_function("x/2^y", [a.into(), b.into()])
    }

    pub fn max_of(&mut self, a: impl Into<NumInput>, b: impl Into<NumInput>) -> Wire {
        self.number_function("max(x,y)", [a.into(), b.into()])
    }

    pub fn min_of(&mut self, a: impl Into<NumInput>, b: impl Into<NumInput>) -> Wire {
        self.number_function("min(x,y)", [a.into(), b.into()])
    }

    /// Clamp with wire-valued bounds, as a fused function.
    pub fn clamp_wires(
        &mut self,
        a: impl Into<NumInput>,
        min: impl Into<NumInput>,
        max: impl Into<NumInput>,
    ) -> Wire {
        self.number_function("clamp(x,y,z)", [a.into(), min.into(), max.into()])
    }

    pub fn lerp(
        &mut self,
        t: impl Into<NumInput>,
        a: impl Into<NumInput>,
        b: impl Into<NumInput>,
    ) -> Wire {
        self.number_function("lerp(x,y,z)", [t.into(), a.into(), b.into()])
    }

    pub fn sin(&mut self, a: impl Into<NumInput>) -> Wire {
        self.number_function("sin(x)", [a.into()])
    }

    pub fn cos(&mut self, a: impl Into<NumInput>) -> Wire {
        self.number_function("cos(x)", [a.into()])
    }

    pub fn tan(&mut self, a: impl Into<NumInput>) -> Wire {
        self.number_function("tan(x)", [a.into()])
    }

    pub fn asin(&mut self, a: impl Into<NumInput>) -> Wire {
        self.number_function("asin(x)", [a.into()])
    }

    pub fn acos(&mut self, a: impl Into<NumInput>) -> Wire {
        self.number_function("acos(x)", [a.into()])
    }

    pub fn atan(&mut self, a: impl Into<NumInput>) -> Wire {
        self.number_function("atan(x)", [a.into()])
    }

    pub fn atan2(&mut self, a: impl Into<NumInput>, b: impl Into<NumInput>) -> Wire {
        self.number_function("atan2(x,y)", [a.into(), b.into()])
    }

    pub fn ceil(&mut self, a: impl Into<NumInput>) -> Wire {
        self.number_function("ceil(x)", [a.into()])
    }

    pub fn floor(&mut self, a: impl Into<NumInput>) -> Wire {
        self.number_function("floor(x)", [a.into()])
    }

    pub fn round(&mut self, a: impl Into<NumInput>, digits: impl Into<NumInput>) -> Wire {
        self.number_function("round(x,y)", [a.into(), digits.into()])
    }

    /// Sign of the input: -1, 0, or 1.
    pub fn sgn(&mut self, a: impl Into<NumInput>) -> Wire {
        self.number_function("sgn(x)", [a.into()])
    }

    pub fn sqrt(&mut self, a: impl Into<NumInput>) -> Wire {
        self.number_function("sqrt(x)", [a.into()])
    }

    /// An on/off signal as 1/0 (or custom values), via a switchbox.
    pub fn bool_to_number(&mut self, value: impl Into<BoolInput>) -> Wire {
        self.numerical_switchbox(1.0, 0.0, value)
    }

    /// Simple moving average over `count` ticks: a chain of pinned unit
    /// delays feeding a running sum closed through a placeholder.
    pub fn moving_avg(&mut self, wire: Wire, count: u32) -> Wire {
        let mut end = wire;
        for _ in 0..count {
            let delayed = self.number_function("x", [end.into()]);
            end = self.stop_optimization(delayed);
        }
        let total = self.placeholder(SignalType::Number);
        let gained = self.add(total, wire);
        let dropped = self.sub(gained, end);
        self.replace_producer(total, dropped);
        self.div(total, count as f64).0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Producer;

    #[test]
    fn add_builds_two_input_block() {
        let mut c = Circuit::new();
        let a = c.input(SignalType::Number, "A", "");
        let sum = c.add(a, 5.0);
        let block = c.block(sum.producer()).unwrap();
        assert!(matches!(block.kind, BlockKind::Add));
        let names: Vec<&str> = block.inputs.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["a_input", "b_input"]);
    }

    #[test]
    fn div_exposes_two_outputs() {
        let mut c = Circuit::new();
        let (q, flag) = c.div(1.0, 2.0);
        assert_eq!(q.signal_type(), SignalType::Number);
        assert_eq!(flag.signal_type(), SignalType::Boolean);
        assert_eq!(q.producer(), flag.producer());
        assert_eq!(flag.node_index(), 1);
    }

    #[test]
    fn function_binds_alphabet_in_order() {
        let mut c = Circuit::new();
        let a = c.input(SignalType::Number, "A", "");
        let w = c.number_function("x+y", [a.into(), 3.into()]);
        let block = c.block(w.producer()).unwrap();
        assert_eq!(block.inputs.len(), 8);
        assert_eq!(block.inputs.get("x_input").unwrap(), a);
        let y = block.inputs.get("y_input").unwrap();
        assert!(matches!(
            c.block(y.producer()).unwrap().kind,
            BlockKind::ConstantNumber { value } if value == 3.0
        ));
        let z = block.inputs.get("z_input").unwrap();
        assert!(c.is_unconnected(z.producer()));
    }

    #[test]
    fn composite_write_fills_all_channels() {
        let mut c = Circuit::new();
        let base = c.input(SignalType::Composite, "base", "");
        let a = c.input(SignalType::Number, "A", "");
        let w = c.composite_write_number(base, &[(2, a.into())]);
        let block = c.block(w.producer()).unwrap();
        // composite + start channel + 32 channels
        assert_eq!(block.inputs.len(), 34);
        assert_eq!(block.inputs.get("channel_2_input").unwrap(), a);
        let ch1 = block.inputs.get("channel_1_input").unwrap();
        assert!(c.is_unconnected(ch1.producer()));
        // Channel ordering is part of the port layout.
        let names: Vec<&str> = block.inputs.iter().map(|(n, _)| n).collect();
        assert_eq!(names[0], "composite_signal_input");
        assert_eq!(names[1], "start_channel_input");
        assert_eq!(names[2], "channel_1_input");
        assert_eq!(names[33], "channel_32_input");
    }

    #[test]
    fn dynamic_writes_bind_the_start_channel_for_both_kinds() {
        let mut c = Circuit::new();
        let base = c.input(SignalType::Composite, "base", "");
        let slot = c.input(SignalType::Number, "slot", "");
        let flag = c.input(SignalType::Boolean, "flag", "");

        let number = c.composite_write_number_dynamic(base, slot, &[(1, 2.5.into())]);
        let block = c.block(number.producer()).unwrap();
        assert!(matches!(
            block.kind,
            BlockKind::CompositeWriteNumber { start_channel: 0 }
        ));
        assert_eq!(block.inputs.get("start_channel_input").unwrap(), slot);

        let boolean = c.composite_write_boolean_dynamic(base, slot, &[(1, flag.into())]);
        let block = c.block(boolean.producer()).unwrap();
        assert!(matches!(
            block.kind,
            BlockKind::CompositeWriteBoolean { start_channel: 0 }
        ));
        assert_eq!(block.inputs.get("start_channel_input").unwrap(), slot);
        assert_eq!(block.inputs.get("channel_1_input").unwrap(), flag);
    }

    #[test]
    #[should_panic(expected = "composite channel must be in 1..=32")]
    fn channel_out_of_range_is_rejected() {
        let mut c = Circuit::new();
        let base = c.input(SignalType::Composite, "base", "");
        c.composite_read_number(base, 33);
    }

    #[test]
    fn boolean_switch_is_synthesized_from_gates() {
        let mut c = Circuit::new();
        let cond = c.input(SignalType::Boolean, "cond", "");
        let on = c.input(SignalType::Boolean, "on", "");
        let off = c.input(SignalType::Boolean, "off", "");
        let out = c.switch(cond, on, off);
        assert!(matches!(
            c.block(out.producer()).unwrap().kind,
            BlockKind::Or
        ));
    }

    #[test]
    #[should_panic(expected = "slider default")]
    fn slider_default_outside_range_is_rejected() {
        let mut c = Circuit::new();
        c.property_slider("value", 0.0, 10.0, 1.0, 11.0);
    }

    #[test]
    fn dropdown_default_must_exist() {
        let mut c = Circuit::new();
        let w = c.property_dropdown("mode", &[("slow", 1.0), ("fast", 2.0)], "fast");
        match &c.block(w.producer()).unwrap().kind {
            BlockKind::PropertyDropdown { selected, .. } => assert_eq!(*selected, 1),
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn moving_avg_closes_a_cycle() {
        let mut c = Circuit::new();
        let x = c.input(SignalType::Number, "x", "");
        let avg = c.moving_avg(x, 3);
        // The average is a divide whose first input is the running sum.
        let block = c.block(avg.producer()).unwrap();
        assert!(matches!(block.kind, BlockKind::Divide));
        let total = block.inputs.get("a_input").unwrap();
        let total_block = c.block(total.producer()).unwrap();
        assert!(matches!(total_block.kind, BlockKind::Subtract));
        // No placeholder left behind.
        let gained = total_block.inputs.get("a_input").unwrap();
        assert!(!matches!(
            c.producer(gained.producer()),
            Producer::Placeholder
        ));
    }

    #[test]
    fn fmt_number_prints_integers_bare() {
        assert_eq!(fmt_number(5.0), "5");
        assert_eq!(fmt_number(-2.0), "-2");
        assert_eq!(fmt_number(0.1), "0.1");
    }

    #[test]
    fn memory_register_and_timer_ports_follow_the_catalog() {
        let mut c = Circuit::new();
        let set = c.input(SignalType::Boolean, "set", "");
        let data = c.input(SignalType::Number, "data", "");
        let reg = c.memory_register(set, (), data, 7.5);
        let block = c.block(reg.producer()).unwrap();
        let names: Vec<&str> = block.inputs.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["set_input", "reset_input", "number_to_store_input"]);
        assert!(matches!(
            block.kind,
            BlockKind::MemoryRegister { reset_value } if reset_value == 7.5
        ));

        let timer = c.timer_ton(set, 3.0, TimerUnit::Ticks);
        let block = c.block(timer.producer()).unwrap();
        let names: Vec<&str> = block.inputs.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["timer_enable_input", "duration_input"]);
    }

    #[test]
    fn junction_and_binary_conversions_have_expected_shapes() {
        let mut c = Circuit::new();
        let value = c.input(SignalType::Number, "v", "");
        let switch = c.input(SignalType::Boolean, "s", "");
        let (on_path, off_path) = c.numerical_junction(value, switch);
        assert_eq!(on_path.producer(), off_path.producer());
        assert_eq!(off_path.node_index(), 1);

        let bits = c.number_to_composite_binary(value);
        assert_eq!(bits.signal_type(), SignalType::Composite);
        let back = c.composite_binary_to_number(bits);
        assert_eq!(back.signal_type(), SignalType::Number);
    }

    #[test]
    fn switch_dispatches_on_the_payload_type() {
        let mut c = Circuit::new();
        let cond = c.input(SignalType::Boolean, "cond", "");
        for (ty, expected) in [
            (SignalType::Composite, BlockKind::CompositeSwitchbox),
            (SignalType::Audio, BlockKind::AudioSwitchbox),
            (SignalType::Video, BlockKind::VideoSwitchbox),
        ] {
            let on = c.unconnected(ty);
            let off = c.unconnected(ty);
            let out = c.switch(cond, on, off);
            assert_eq!(c.block(out.producer()).unwrap().kind, expected);
        }
    }

    #[test]
    fn relaxed_comparisons_expand_to_gate_trees() {
        let mut c = Circuit::new();
        let a = c.input(SignalType::Number, "a", "");
        let ge = c.greater_equal(a, 2.0);
        assert!(matches!(c.block(ge.producer()).unwrap().kind, BlockKind::Or));
        let ne = c.not_equal(a, 2.0);
        assert!(matches!(c.block(ne.producer()).unwrap().kind, BlockKind::Not));
    }

    #[test]
    fn in_place_channel_write_rebinds_the_wire() {
        let mut c = Circuit::new();
        let a = c.input(SignalType::Number, "a", "");
        let mut bundle = c.unconnected(SignalType::Composite);
        let before = bundle.producer();
        c.set_number_channel(&mut bundle, 3, a);
        assert_ne!(bundle.producer(), before);
        let block = c.block(bundle.producer()).unwrap();
        assert!(matches!(
            block.kind,
            BlockKind::CompositeWriteNumber { start_channel: 1 }
        ));
        assert_eq!(block.inputs.get("channel_3_input").unwrap(), a);
    }

    #[test]
    fn script_blocks_carry_minified_source() {
        let mut c = Circuit::new();
        let data = c.input(SignalType::Composite, "data", "");
        let (out, video) = c
            .script("-- doc\nfunction onTick()\nend\n", data, ())
            .unwrap();
        assert_eq!(out.signal_type(), SignalType::Composite);
        assert_eq!(video.node_index(), 1);
        match &c.block(out.producer()).unwrap().kind {
            BlockKind::Script { source } => {
                assert_eq!(source, "function onTick()\nend");
            }
            other => panic!("unexpected kind {:?}", other),
        }

        assert!(c.script("broken = (", (), ()).is_err());
    }

    #[test]
    fn pulse_and_equal_properties_serialize() {
        use approx::assert_relative_eq;
        let mut c = Circuit::new();
        let flag = c.input(SignalType::Boolean, "f", "");
        let pulsed = c.pulse(flag, PulseMode::OnToOff);
        let props = c.block(pulsed.producer()).unwrap().kind.properties();
        assert_eq!(props.get("mode").and_then(|v| v.as_str()), Some("on_to_off"));

        let a = c.input(SignalType::Number, "a", "");
        let near = c.equal_within(a, 1.0, 0.25);
        let props = c.block(near.producer()).unwrap().kind.properties();
        assert_relative_eq!(
            props.get("epsilon").and_then(|v| v.as_f64()).unwrap(),
            0.25
        );
    }
}
