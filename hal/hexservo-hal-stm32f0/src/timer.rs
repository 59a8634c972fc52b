//! TIM3 servo timer
//!
//! TIM3 runs as a free-running up-counter with ARR = 0xFFFF. The update
//! event (UIF) marks each wrap and capture/compare channel 1 (CC1IF) marks
//! falling edges. Both raise the single TIM3 interrupt.

use embassy_stm32::pac;

use hexservo_hal::ServoTimer;

/// Compare channel used for falling edges (CC1)
const COMPARE_CHANNEL: usize = 0;

/// Clear status flags without a read-modify-write
///
/// SR bits are rc_w0: writing 1 leaves a flag untouched, so `f` only has to
/// zero the flags being cleared.
fn clear_flags(f: impl FnOnce(&mut pac::timer::regs::SrGp16)) {
    pac::TIM3.sr().write(|w| {
        w.0 = !0;
        f(w);
    });
}

/// [`ServoTimer`] on TIM3
pub struct Tim3ServoTimer {
    prescaler: u16,
}

impl Tim3ServoTimer {
    /// Create the driver; `prescaler` comes from [`crate::prescaler_for`]
    pub const fn new(prescaler: u16) -> Self {
        Self { prescaler }
    }

    /// Unmask TIM3 in the NVIC
    ///
    /// # Safety
    ///
    /// The `TIM3` vector must call the engine's interrupt entry point before
    /// this is called.
    pub unsafe fn unmask_interrupt() {
        cortex_m::peripheral::NVIC::unmask(pac::Interrupt::TIM3);
    }
}

impl ServoTimer for Tim3ServoTimer {
    fn start(&mut self) {
        let regs = pac::TIM3;
        pac::RCC.apb1enr().modify(|w| w.set_tim3en(true));

        regs.cr1().modify(|w| w.set_cen(false));
        regs.psc().write_value(self.prescaler);
        regs.arr().write(|w| w.set_arr(0xFFFF));
        // Load PSC now, then drop the UIF this update sets
        regs.egr().write(|w| w.set_ug(true));
        regs.cnt().write(|w| w.set_cnt(0));

        regs.sr().write(|_| {});
        regs.dier().write(|w| w.set_uie(true));
        regs.cr1().modify(|w| w.set_cen(true));
    }

    fn stop(&mut self) {
        let regs = pac::TIM3;
        regs.cr1().modify(|w| w.set_cen(false));
        regs.dier().write(|_| {});
        regs.sr().write(|_| {});
    }

    fn counter(&self) -> u16 {
        pac::TIM3.cnt().read().cnt()
    }

    fn set_compare(&mut self, value: u16) {
        let regs = pac::TIM3;
        regs.ccr(COMPARE_CHANNEL).write(|w| w.set_ccr(value));
        regs.dier().modify(|w| w.set_ccie(COMPARE_CHANNEL, true));
    }

    fn disable_compare(&mut self) {
        let regs = pac::TIM3;
        regs.dier().modify(|w| w.set_ccie(COMPARE_CHANNEL, false));
        clear_flags(|w| w.set_ccif(COMPARE_CHANNEL, false));
    }

    fn take_overflow(&mut self) -> bool {
        let regs = pac::TIM3;
        if !regs.sr().read().uif() {
            return false;
        }
        clear_flags(|w| w.set_uif(false));
        true
    }

    fn take_compare(&mut self) -> bool {
        let regs = pac::TIM3;
        if !regs.sr().read().ccif(COMPARE_CHANNEL) {
            return false;
        }
        clear_flags(|w| w.set_ccif(COMPARE_CHANNEL, false));
        true
    }
}
