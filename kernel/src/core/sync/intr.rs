/*!
 * Simulated Interrupt State
 *
 * Every kernel thread (a CPU's scheduler loop or a process) carries its own
 * interrupt-enable flag and a `push_off`/`pop_off` nesting counter. Taking a
 * spin lock disables interrupts; releasing the outermost one restores the
 * flag saved when the first lock was taken.
 */

use std::cell::Cell;

#[derive(Debug, Clone, Copy)]
struct IntrState {
    enabled: bool,
    depth: u32,
    intena: bool,
}

thread_local! {
    static INTR: Cell<IntrState> = const {
        Cell::new(IntrState {
            enabled: true,
            depth: 0,
            intena: false,
        })
    };
}

#[inline]
fn update(f: impl FnOnce(&mut IntrState)) {
    INTR.with(|cell| {
        let mut state = cell.get();
        f(&mut state);
        cell.set(state);
    });
}

#[inline]
fn read() -> IntrState {
    INTR.with(Cell::get)
}

/// Enable interrupts on this kernel thread
#[inline]
pub fn intr_on() {
    update(|s| s.enabled = true);
}

/// Disable interrupts on this kernel thread
#[inline]
pub fn intr_off() {
    update(|s| s.enabled = false);
}

/// Are interrupts enabled on this kernel thread?
#[inline]
#[must_use]
pub fn intr_get() -> bool {
    read().enabled
}

/// Disable interrupts, remembering the previous state at the outermost level
pub fn push_off() {
    update(|s| {
        let old = s.enabled;
        s.enabled = false;
        if s.depth == 0 {
            s.intena = old;
        }
        s.depth += 1;
    });
}

/// Undo one `push_off`
///
/// # Panics
/// Panics when interrupts are enabled or nothing was pushed.
pub fn pop_off() {
    let state = read();
    assert!(!state.enabled, "pop_off - interruptible");
    assert!(state.depth >= 1, "pop_off");
    update(|s| {
        s.depth -= 1;
        if s.depth == 0 && s.intena {
            s.enabled = true;
        }
    });
}

/// Current `push_off` nesting level
#[inline]
#[must_use]
pub fn depth() -> u32 {
    read().depth
}

/// Interrupt state saved by the outermost `push_off`
#[inline]
#[must_use]
pub fn intena() -> bool {
    read().intena
}

/// Restore the saved interrupt state after a context transfer
#[inline]
pub fn set_intena(intena: bool) {
    update(|s| s.intena = intena);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_nesting_restores_on_outermost_pop() {
        thread::spawn(|| {
            intr_on();
            push_off();
            push_off();
            assert_eq!(depth(), 2);
            assert!(!intr_get());
            pop_off();
            assert!(!intr_get());
            pop_off();
            assert!(intr_get());
            assert_eq!(depth(), 0);
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_disabled_before_push_stays_disabled() {
        thread::spawn(|| {
            intr_off();
            push_off();
            pop_off();
            assert!(!intr_get());
        })
        .join()
        .unwrap();
    }

    #[test]
    #[should_panic(expected = "pop_off")]
    fn test_unbalanced_pop_panics() {
        intr_off();
        pop_off();
    }
}
