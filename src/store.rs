//! src/store.rs
//!
//! The object store the compiler allocates literals through. A runtime
//! embedding the compiler supplies its own implementation; [`Heap`] is the
//! standalone one used by the CLI and the tests.

use std::collections::HashMap;
use std::rc::Rc;

use log::trace;

use crate::value::{ArrayObject, FrameMap, FrameObject, Symbol, Value};

pub trait ObjectStore {
    /// Returns the unique symbol for `name` (case-insensitive).
    fn intern(&mut self, name: &str) -> Symbol;

    fn make_string(&mut self, text: &str) -> Value;
    fn make_real(&mut self, value: f64) -> Value;
    fn make_array(&mut self, class: Symbol, elements: Vec<Value>) -> Value;

    /// Builds a frame with a private (unshared) map.
    fn make_frame(&mut self, slots: Vec<Symbol>, values: Vec<Value>) -> Value;

    /// Returns a reusable map for `slots`; equal slot lists yield the same map.
    fn shared_map(&mut self, slots: &[Symbol]) -> Rc<FrameMap>;

    fn global_constant(&self, name: &Symbol) -> Option<Value>;
    fn define_constant(&mut self, name: Symbol, value: Value);

    /// True if `name` is a global variable or global function.
    fn has_global(&self, name: &Symbol) -> bool;
}

#[derive(Debug, Default)]
pub struct Heap {
    symbols: HashMap<String, Symbol>,
    maps: HashMap<Vec<Symbol>, Rc<FrameMap>>,
    constants: HashMap<Symbol, Value>,
    globals: HashMap<Symbol, Value>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define_global(&mut self, name: &str, value: Value) {
        let sym = self.intern(name);
        self.globals.insert(sym, value);
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }
}

impl ObjectStore for Heap {
    fn intern(&mut self, name: &str) -> Symbol {
        let key = name.to_ascii_lowercase();
        if let Some(sym) = self.symbols.get(&key) {
            return sym.clone();
        }
        let sym = Symbol::new(name);
        self.symbols.insert(key, sym.clone());
        sym
    }

    fn make_string(&mut self, text: &str) -> Value {
        Value::String(Rc::from(text))
    }

    fn make_real(&mut self, value: f64) -> Value {
        Value::Real(value)
    }

    fn make_array(&mut self, class: Symbol, elements: Vec<Value>) -> Value {
        Value::Array(Rc::new(ArrayObject { class, elements }))
    }

    fn make_frame(&mut self, slots: Vec<Symbol>, values: Vec<Value>) -> Value {
        let map = Rc::new(FrameMap { slots, shared: false });
        Value::Frame(Rc::new(FrameObject { map, values }))
    }

    fn shared_map(&mut self, slots: &[Symbol]) -> Rc<FrameMap> {
        if let Some(map) = self.maps.get(slots) {
            return Rc::clone(map);
        }
        trace!("new shared map with {} slots", slots.len());
        let map = Rc::new(FrameMap { slots: slots.to_vec(), shared: true });
        self.maps.insert(slots.to_vec(), Rc::clone(&map));
        map
    }

    fn global_constant(&self, name: &Symbol) -> Option<Value> {
        self.constants.get(name).cloned()
    }

    fn define_constant(&mut self, name: Symbol, value: Value) {
        self.constants.insert(name, value);
    }

    fn has_global(&self, name: &Symbol) -> bool {
        self.globals.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_returns_shared_storage() {
        let mut heap = Heap::new();
        let a = heap.intern("Foo");
        let b = heap.intern("foo");
        assert!(a.same_storage(&b));
        assert_eq!(a.as_str(), "Foo");
        assert_eq!(heap.symbol_count(), 1);
    }

    #[test]
    fn shared_maps_are_reused() {
        let mut heap = Heap::new();
        let slots = [heap.intern("a"), heap.intern("b")];
        let m1 = heap.shared_map(&slots);
        let m2 = heap.shared_map(&slots);
        assert!(Rc::ptr_eq(&m1, &m2));
        assert!(m1.shared);
    }
}
