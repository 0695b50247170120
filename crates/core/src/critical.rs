//! Interrupt masking for timing-critical exchanges.
//!
//! The half-duplex controller bus must run a full transmit + receive with the
//! interrupt system masked: a single interrupt landing inside a bit window
//! stretches a pulse and the peer decodes garbage. [`CriticalSection`] is an
//! RAII guard, so interrupts come back on every exit path, including the
//! early returns taken when a wait loop times out.

/// Global interrupt enable/disable for the target.
pub trait InterruptControl {
    fn disable(&mut self);
    fn enable(&mut self);
}

impl<I: InterruptControl + ?Sized> InterruptControl for &mut I {
    fn disable(&mut self) {
        (**self).disable()
    }

    fn enable(&mut self) {
        (**self).enable()
    }
}

/// Scoped interrupt mask. Interrupts are disabled on [`enter`](Self::enter)
/// and re-enabled when the guard is dropped.
#[must_use = "interrupts are re-enabled as soon as the guard is dropped"]
pub struct CriticalSection<'a, I: InterruptControl + ?Sized> {
    control: &'a mut I,
}

impl<'a, I: InterruptControl + ?Sized> CriticalSection<'a, I> {
    pub fn enter(control: &'a mut I) -> Self {
        control.disable();
        Self { control }
    }
}

impl<I: InterruptControl + ?Sized> Drop for CriticalSection<'_, I> {
    fn drop(&mut self) {
        self.control.enable();
    }
}
