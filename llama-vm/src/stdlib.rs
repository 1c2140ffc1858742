//! Native math functions bound into every freshly-constructed [`Vm`], matching
//! the surface of the original `std::math` header (`sin`, `cos`, `tan`, `asin`,
//! `atan`, `atan2`, `exp`, `sqrt`, `cbrt`, `hypot`, `abs`, `floor`, `ceil`,
//! `round`, `truncate`, `is_inf`, `is_nan`). Unlike the header this does not
//! declare `is_inf` twice.

use llama_core::value::Value;

use crate::Vm;

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Float(f) => Some(*f),
        Value::Int(i) => Some(*i as f64),
        _ => None,
    }
}

fn unary(f: impl Fn(f64) -> f64 + 'static) -> Box<dyn Fn(&[Value]) -> Value> {
    Box::new(move |args| match args.first().and_then(as_f64) {
        Some(x) => Value::Float(f(x)),
        None => Value::Null,
    })
}

fn binary(f: impl Fn(f64, f64) -> f64 + 'static) -> Box<dyn Fn(&[Value]) -> Value> {
    Box::new(move |args| match (args.first().and_then(as_f64), args.get(1).and_then(as_f64)) {
        (Some(a), Some(b)) => Value::Float(f(a, b)),
        _ => Value::Null,
    })
}

fn predicate(f: impl Fn(f64) -> bool + 'static) -> Box<dyn Fn(&[Value]) -> Value> {
    Box::new(move |args| match args.first().and_then(as_f64) {
        Some(x) => Value::Bool(f(x)),
        None => Value::Null,
    })
}

/// Registers `std.math`'s functions as natives callable from compiled code.
pub fn install(vm: &mut Vm) {
    vm.register_native("sin", 1, unary(f64::sin));
    vm.register_native("cos", 1, unary(f64::cos));
    vm.register_native("tan", 1, unary(f64::tan));
    vm.register_native("asin", 1, unary(f64::asin));
    vm.register_native("atan", 1, unary(f64::atan));
    vm.register_native("atan2", 2, binary(f64::atan2));
    vm.register_native("exp", 1, unary(f64::exp));
    vm.register_native("sqrt", 1, unary(f64::sqrt));
    vm.register_native("cbrt", 1, unary(f64::cbrt));
    vm.register_native("hypot", 2, binary(f64::hypot));
    vm.register_native("abs", 1, unary(f64::abs));
    vm.register_native("floor", 1, unary(f64::floor));
    vm.register_native("ceil", 1, unary(f64::ceil));
    vm.register_native("round", 1, unary(f64::round));
    vm.register_native("truncate", 1, unary(f64::trunc));
    vm.register_native("is_inf", 1, predicate(f64::is_infinite));
    vm.register_native("is_nan", 1, predicate(f64::is_nan));
}

#[cfg(test)]
mod tests {
    use super::*;
    use llama_bytecode::Module;

    #[test]
    fn sqrt_is_reachable_by_name_through_the_function_pool() {
        let mut vm = Vm::new(Module::new());
        install(&mut vm);
        let idx = vm.module().funcs.get("sqrt").unwrap();
        let result = vm.call(idx, &[Value::Float(9.0)]).unwrap();
        assert_eq!(result, Value::Float(3.0));
    }

    #[test]
    fn is_nan_matches_float_classification() {
        let mut vm = Vm::new(Module::new());
        install(&mut vm);
        let idx = vm.module().funcs.get("is_nan").unwrap();
        let result = vm.call(idx, &[Value::Float(f64::NAN)]).unwrap();
        assert_eq!(result, Value::Bool(true));
    }
}
