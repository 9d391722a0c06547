/*!
 * Synchronization Primitives
 *
 * - `SpinLock`: named kernel lock that disables (simulated) interrupts while held
 * - `intr`: per-kernel-thread interrupt flag and `push_off`/`pop_off` nesting
 */

pub mod intr;
mod spinlock;

pub use spinlock::{SpinGuard, SpinLock};
