//! Combined `Effect` + `ParameterInfo` trait for boxed effects.
//!
//! Effect slots store `Box<dyn EffectWithParams + Send>`. A blanket impl
//! covers every type that implements both [`Effect`] and [`ParameterInfo`],
//! so effect authors never implement this trait by hand.

#[cfg(not(feature = "std"))]
use alloc::string::String;

use crate::effect::Effect;
use crate::param_info::{ParamDescriptor, ParameterInfo};

/// Object-safe view of an effect together with its parameters.
pub trait EffectWithParams: Effect {
    /// Parameter count.
    fn effect_param_count(&self) -> usize;

    /// Parameter descriptor by index.
    fn effect_param_info(&self, index: usize) -> Option<ParamDescriptor>;

    /// Parameter value by index.
    fn effect_get_param(&self, index: usize) -> f32;

    /// Set a parameter value by index.
    fn effect_set_param(&mut self, index: usize, value: f32);

    /// Parameter index for a `string_id`.
    fn effect_param_index(&self, string_id: &str) -> Option<usize>;

    /// Format a value for display. `None` when the index is out of range.
    fn effect_format_value(&self, index: usize, value: f32) -> Option<String>;

    /// Parse display text into a value. `None` when out of range or unparsable.
    fn effect_parse_value(&self, index: usize, text: &str) -> Option<f32>;
}

impl<T: Effect + ParameterInfo> EffectWithParams for T {
    fn effect_param_count(&self) -> usize {
        self.param_count()
    }

    fn effect_param_info(&self, index: usize) -> Option<ParamDescriptor> {
        self.param_info(index)
    }

    fn effect_get_param(&self, index: usize) -> f32 {
        self.get_param(index)
    }

    fn effect_set_param(&mut self, index: usize, value: f32) {
        self.set_param(index, value);
    }

    fn effect_param_index(&self, string_id: &str) -> Option<usize> {
        self.find_param_by_string_id(string_id)
    }

    fn effect_format_value(&self, index: usize, value: f32) -> Option<String> {
        self.param_info(index).map(|desc| desc.format_value(value))
    }

    fn effect_parse_value(&self, index: usize, text: &str) -> Option<f32> {
        self.param_info(index).and_then(|desc| desc.parse_value(text))
    }
}
