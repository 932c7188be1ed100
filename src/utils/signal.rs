use std::{cell::RefCell, rc::Rc};

/// A single-threaded multi-listener event source.
pub struct Signal<T> {
    listeners: RefCell<Vec<Rc<dyn Fn(&T)>>>,
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self {
            listeners: Default::default(),
        }
    }
}

impl<T> Signal<T> {
    pub fn subscribe<F: Fn(&T) + 'static>(&self, f: F) {
        self.listeners.borrow_mut().push(Rc::new(f));
    }

    pub fn emit(&self, t: &T) {
        // Listeners may subscribe more listeners while we iterate.
        let listeners = self.listeners.borrow().clone();
        for listener in &listeners {
            listener(t);
        }
    }

    pub fn clear(&self) {
        self.listeners.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::cell::Cell};

    #[test]
    fn emit_reaches_all_listeners() {
        let signal = Signal::<u32>::default();
        let sum = Rc::new(Cell::new(0));
        for _ in 0..3 {
            let sum = sum.clone();
            signal.subscribe(move |n| sum.set(sum.get() + *n));
        }
        signal.emit(&7);
        assert_eq!(sum.get(), 21);
        signal.clear();
        signal.emit(&7);
        assert_eq!(sum.get(), 21);
    }
}
