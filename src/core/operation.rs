// imgbatch/src/core/operation.rs
use super::{PreflightError, SupportedFormat};

pub const FILTER_NAMES: [&str; 4] = ["brightness", "contrast", "sharpen", "grayscale"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamKind {
    PositiveInt,
    Factor { min: f32, max: f32 },
    Format,
    Choice(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Enhance,
    Resize,
    Convert,
    Filter,
    Organize,
}

/// Static descriptor of one command: its name and parameter schema.
#[derive(Debug)]
pub struct OperationSpec {
    pub kind: OperationKind,
    pub name: &'static str,
    pub params: &'static [ParamSpec],
    pub description: &'static str,
}

impl OperationSpec {
    /// `resize <width> <height>`, `filter <name> [value]`, ...
    pub fn usage(&self) -> String {
        let mut usage = self.name.to_string();
        for param in self.params {
            if param.required {
                usage.push_str(&format!(" <{}>", param.name));
            } else {
                usage.push_str(&format!(" [{}]", param.name));
            }
        }
        usage
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterKind {
    Brightness(f32),
    Contrast(f32),
    Sharpen(f32),
    Grayscale,
}

/// A validated request: operation kind plus its typed parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operation {
    Enhance,
    Resize { width: u32, height: u32 },
    Convert(SupportedFormat),
    Filter(FilterKind),
    Organize,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Enhance => "enhance",
            Operation::Resize { .. } => "resize",
            Operation::Convert(_) => "convert",
            Operation::Filter(_) => "filter",
            Operation::Organize => "organize",
        }
    }
}

static OPERATIONS: [OperationSpec; 5] = [
    OperationSpec {
        kind: OperationKind::Resize,
        name: "resize",
        params: &[
            ParamSpec { name: "width", kind: ParamKind::PositiveInt, required: true },
            ParamSpec { name: "height", kind: ParamKind::PositiveInt, required: true },
        ],
        description: "Resize images to exactly the given dimensions",
    },
    OperationSpec {
        kind: OperationKind::Convert,
        name: "convert",
        params: &[ParamSpec { name: "format", kind: ParamKind::Format, required: true }],
        description: "Convert images to the given format (jpg/png/bmp)",
    },
    OperationSpec {
        kind: OperationKind::Filter,
        name: "filter",
        params: &[
            ParamSpec { name: "name", kind: ParamKind::Choice(&FILTER_NAMES), required: true },
            ParamSpec { name: "value", kind: ParamKind::Factor { min: 0.0, max: 2.0 }, required: false },
        ],
        description: "Apply a filter (brightness/contrast/sharpen take a factor in 0..2; grayscale takes none)",
    },
    OperationSpec {
        kind: OperationKind::Enhance,
        name: "enhance",
        params: &[],
        description: "AI 2x upscale, written next to each image as enhanced_<name>",
    },
    OperationSpec {
        kind: OperationKind::Organize,
        name: "organize",
        params: &[],
        description: "Move images into per-format subdirectories",
    },
];

enum ParamValue<'a> {
    Int(u32),
    Float(f32),
    Format(SupportedFormat),
    Choice(&'a str),
}

/// Closed table of the supported operations, built once at startup.
#[derive(Debug, Clone, Copy)]
pub struct OperationRegistry {
    specs: &'static [OperationSpec],
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self { specs: &OPERATIONS }
    }

    pub fn specs(&self) -> impl Iterator<Item = &'static OperationSpec> {
        self.specs.iter()
    }

    pub fn get(&self, name: &str) -> Result<&'static OperationSpec, PreflightError> {
        self.specs
            .iter()
            .find(|spec| spec.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| PreflightError::UnknownOperation(name.to_string()))
    }

    /// Looks up `name` and validates `raw` against its schema.
    pub fn resolve(&self, name: &str, raw: &[&str]) -> Result<Operation, PreflightError> {
        let spec = self.get(name)?;
        self.validate(spec, raw)
    }

    pub fn validate(&self, spec: &OperationSpec, raw: &[&str]) -> Result<Operation, PreflightError> {
        if raw.len() > spec.params.len() {
            return Err(PreflightError::InvalidParameter {
                name: raw[spec.params.len()].to_string(),
                reason: format!("unexpected argument, usage: {}", spec.usage()),
            });
        }

        let mut values = Vec::with_capacity(spec.params.len());
        for (idx, param) in spec.params.iter().enumerate() {
            match raw.get(idx) {
                Some(arg) => values.push(Some(parse_param(param, arg)?)),
                None if param.required => {
                    return Err(PreflightError::InvalidParameter {
                        name: param.name.to_string(),
                        reason: format!("missing, usage: {}", spec.usage()),
                    });
                }
                None => values.push(None),
            }
        }

        let operation = match (spec.kind, values.as_slice()) {
            (OperationKind::Enhance, []) => Operation::Enhance,
            (OperationKind::Organize, []) => Operation::Organize,
            (OperationKind::Resize, [Some(ParamValue::Int(width)), Some(ParamValue::Int(height))]) => {
                Operation::Resize { width: *width, height: *height }
            }
            (OperationKind::Convert, [Some(ParamValue::Format(format))]) => Operation::Convert(*format),
            (OperationKind::Filter, [Some(ParamValue::Choice(name)), value]) => {
                let value = match value {
                    Some(ParamValue::Float(value)) => Some(*value),
                    _ => None,
                };
                Operation::Filter(filter_kind(name, value)?)
            }
            _ => {
                return Err(PreflightError::InvalidParameter {
                    name: spec.name.to_string(),
                    reason: format!("arguments do not match usage: {}", spec.usage()),
                });
            }
        };

        log::debug!("Validated operation: {:?}", operation);
        Ok(operation)
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_param<'a>(param: &ParamSpec, arg: &'a str) -> Result<ParamValue<'a>, PreflightError> {
    let invalid = |reason: String| PreflightError::InvalidParameter {
        name: param.name.to_string(),
        reason,
    };

    match param.kind {
        ParamKind::PositiveInt => match arg.parse::<u32>() {
            Ok(value) if value > 0 => Ok(ParamValue::Int(value)),
            _ => Err(invalid(format!("'{}' is not a positive integer", arg))),
        },
        ParamKind::Factor { min, max } => match arg.parse::<f32>() {
            Ok(value) if (min..=max).contains(&value) => Ok(ParamValue::Float(value)),
            Ok(value) => Err(invalid(format!("{} is outside [{:.1}, {:.1}]", value, min, max))),
            Err(_) => Err(invalid(format!("'{}' is not a number", arg))),
        },
        ParamKind::Format => arg.parse::<SupportedFormat>().map(ParamValue::Format),
        ParamKind::Choice(choices) => choices
            .iter()
            .find(|choice| choice.eq_ignore_ascii_case(arg))
            .map(|_| ParamValue::Choice(arg))
            .ok_or_else(|| invalid(format!("'{}' is not one of {}", arg, choices.join("/")))),
    }
}

fn filter_kind(name: &str, value: Option<f32>) -> Result<FilterKind, PreflightError> {
    let name = name.to_ascii_lowercase();
    if name == "grayscale" {
        return match value {
            None => Ok(FilterKind::Grayscale),
            Some(_) => Err(PreflightError::InvalidParameter {
                name: "value".to_string(),
                reason: "grayscale takes no value".to_string(),
            }),
        };
    }

    let value = value.ok_or_else(|| PreflightError::InvalidParameter {
        name: "value".to_string(),
        reason: format!("{} requires a factor in [0.0, 2.0]", name),
    })?;

    match name.as_str() {
        "brightness" => Ok(FilterKind::Brightness(value)),
        "contrast" => Ok(FilterKind::Contrast(value)),
        "sharpen" => Ok(FilterKind::Sharpen(value)),
        other => Err(PreflightError::InvalidParameter {
            name: "name".to_string(),
            reason: format!("'{}' is not a known filter", other),
        }),
    }
}
