//! Unit conversion for length, mass, volume, time and temperature

use async_trait::async_trait;

use crate::core::{ConclaveError, Result, ToolCall, ToolCategory, ToolDefinition};
use crate::tools::Tool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dimension {
    Length,
    Mass,
    Volume,
    Time,
    Temperature,
}

/// Linear units as (aliases, dimension, factor to the base unit).
/// Base units: metre, kilogram, litre, second.
const LINEAR_UNITS: &[(&[&str], Dimension, f64)] = &[
    (&["mm", "millimeter", "millimeters", "millimetre", "millimetres"], Dimension::Length, 0.001),
    (&["cm", "centimeter", "centimeters", "centimetre", "centimetres"], Dimension::Length, 0.01),
    (&["m", "meter", "meters", "metre", "metres"], Dimension::Length, 1.0),
    (&["km", "kilometer", "kilometers", "kilometre", "kilometres"], Dimension::Length, 1000.0),
    (&["in", "inch", "inches"], Dimension::Length, 0.0254),
    (&["ft", "foot", "feet"], Dimension::Length, 0.3048),
    (&["yd", "yard", "yards"], Dimension::Length, 0.9144),
    (&["mi", "mile", "miles"], Dimension::Length, 1609.344),
    (&["nmi", "nautical_mile", "nautical_miles"], Dimension::Length, 1852.0),
    (&["mg", "milligram", "milligrams"], Dimension::Mass, 1e-6),
    (&["g", "gram", "grams"], Dimension::Mass, 0.001),
    (&["kg", "kilogram", "kilograms"], Dimension::Mass, 1.0),
    (&["t", "tonne", "tonnes"], Dimension::Mass, 1000.0),
    (&["oz", "ounce", "ounces"], Dimension::Mass, 0.028_349_523_125),
    (&["lb", "lbs", "pound", "pounds"], Dimension::Mass, 0.453_592_37),
    (&["ml", "milliliter", "milliliters", "millilitre", "millilitres"], Dimension::Volume, 0.001),
    (&["l", "liter", "liters", "litre", "litres"], Dimension::Volume, 1.0),
    (&["m3", "cubic_meter", "cubic_meters"], Dimension::Volume, 1000.0),
    (&["tsp", "teaspoon", "teaspoons"], Dimension::Volume, 0.004_928_921_593_75),
    (&["tbsp", "tablespoon", "tablespoons"], Dimension::Volume, 0.014_786_764_781_25),
    (&["cup", "cups"], Dimension::Volume, 0.236_588_236_5),
    (&["pt", "pint", "pints"], Dimension::Volume, 0.473_176_473),
    (&["qt", "quart", "quarts"], Dimension::Volume, 0.946_352_946),
    (&["gal", "gallon", "gallons"], Dimension::Volume, 3.785_411_784),
    (&["ms", "millisecond", "milliseconds"], Dimension::Time, 0.001),
    (&["s", "sec", "second", "seconds"], Dimension::Time, 1.0),
    (&["min", "minute", "minutes"], Dimension::Time, 60.0),
    (&["h", "hr", "hour", "hours"], Dimension::Time, 3600.0),
    (&["d", "day", "days"], Dimension::Time, 86_400.0),
    (&["wk", "week", "weeks"], Dimension::Time, 604_800.0),
    (&["yr", "year", "years"], Dimension::Time, 31_557_600.0),
];

#[derive(Debug, Clone, Copy, PartialEq)]
enum Unit {
    Linear(Dimension, f64),
    Celsius,
    Fahrenheit,
    Kelvin,
}

impl Unit {
    fn dimension(&self) -> Dimension {
        match self {
            Unit::Linear(dimension, _) => *dimension,
            _ => Dimension::Temperature,
        }
    }

    fn to_base(&self, value: f64) -> f64 {
        match self {
            Unit::Linear(_, factor) => value * factor,
            Unit::Celsius => value,
            Unit::Fahrenheit => (value - 32.0) * 5.0 / 9.0,
            Unit::Kelvin => value - 273.15,
        }
    }

    fn from_base(&self, value: f64) -> f64 {
        match self {
            Unit::Linear(_, factor) => value / factor,
            Unit::Celsius => value,
            Unit::Fahrenheit => value * 9.0 / 5.0 + 32.0,
            Unit::Kelvin => value + 273.15,
        }
    }
}

fn lookup(name: &str) -> Result<Unit> {
    let key = name.trim().to_lowercase().replace(' ', "_");
    let key = key.trim_start_matches('°');
    match key {
        "c" | "celsius" | "degc" => return Ok(Unit::Celsius),
        "f" | "fahrenheit" | "degf" => return Ok(Unit::Fahrenheit),
        "k" | "kelvin" => return Ok(Unit::Kelvin),
        _ => {}
    }
    LINEAR_UNITS
        .iter()
        .find(|(aliases, _, _)| aliases.contains(&key))
        .map(|(_, dimension, factor)| Unit::Linear(*dimension, *factor))
        .ok_or_else(|| ConclaveError::validation(format!("unknown unit '{}'", name)))
}

/// Split "12.5 km" into its number and unit
fn split_quantity(quantity: &str) -> Result<(f64, &str)> {
    let quantity = quantity.trim();
    let end = quantity
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')))
        .map(|(i, _)| i)
        .unwrap_or(quantity.len());

    // Back off an exponent marker that actually starts the unit name
    let mut end = end;
    while end > 0 && quantity[..end].ends_with(['e', 'E']) {
        end -= 1;
    }

    let (number, unit) = quantity.split_at(end);
    let value = number.trim().parse::<f64>().map_err(|_| {
        ConclaveError::validation(format!("expected a quantity like '12 km', got '{}'", quantity))
    })?;
    Ok((value, unit.trim()))
}

/// Convert a quantity such as "5 miles" into the target unit
pub fn convert(quantity: &str, to_unit: &str) -> Result<String> {
    let (value, from_name) = split_quantity(quantity)?;
    let from = lookup(from_name)?;
    let to = lookup(to_unit)?;

    if from.dimension() != to.dimension() {
        return Err(ConclaveError::validation(format!(
            "cannot convert {} to {}: incompatible units",
            from_name, to_unit
        )));
    }

    let converted = to.from_base(from.to_base(value));
    let rounded = (converted * 1e6).round() / 1e6;
    Ok(format!("{} {}", rounded, to_unit.trim()))
}

/// Tool for unit conversions
#[derive(Debug, Clone, Default)]
pub struct UnitConverter;

impl UnitConverter {
    /// Create a new instance
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for UnitConverter {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            "unit_converter",
            "Convert a quantity between units of length, mass, volume, time or temperature",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "quantity": {
                        "type": "string",
                        "description": "Value with its unit, e.g. '26.2 miles' or '100 F'"
                    },
                    "to_unit": {
                        "type": "string",
                        "description": "Target unit, e.g. 'km' or 'celsius'"
                    }
                },
                "required": ["quantity", "to_unit"]
            }),
        )
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Expert
    }

    async fn call(&self, call: &ToolCall) -> Result<String> {
        let quantity = call.require_string("quantity")?;
        let to_unit = call.require_string("to_unit")?;
        convert(&quantity, &to_unit)
    }
}
