//! Host test harness: an engine wired to the simulated timer and pins

use embedded_hal::delay::DelayNs;

use hexservo_hal::mock::{MockPins, MockTimer, PinLog, SimClock};

use crate::config::EngineConfig;
use crate::engine::ServoEngine;

pub(crate) type SimEngine<'a> = ServoEngine<MockTimer<'a>, MockPins<'a>>;

/// Simulated board: clock plus pin recorder
pub(crate) struct Rig {
    pub clock: SimClock,
    pub log: PinLog,
}

impl Rig {
    pub fn new() -> Self {
        Self {
            clock: SimClock::new(),
            log: PinLog::new(),
        }
    }

    pub fn engine(&self) -> SimEngine<'_> {
        self.engine_with(EngineConfig::new())
    }

    pub fn engine_with(&self, config: EngineConfig) -> SimEngine<'_> {
        ServoEngine::new(
            MockTimer::new(&self.clock),
            MockPins::new(&self.clock, &self.log),
            config,
        )
    }

    /// Advance simulated time by `ticks`, servicing every interrupt on the way
    pub fn run_for(&self, engine: &SimEngine<'_>, ticks: u64) {
        let limit = self.clock.now() + ticks;
        while self.clock.advance_until(limit) {
            engine.on_timer_interrupt();
        }
    }

    /// Advance until `count` more periods have started
    ///
    /// Returns just after the last period's pins were raised.
    pub fn run_periods(&self, engine: &SimEngine<'_>, count: u32) {
        let goal = engine.periods() + count;
        while engine.periods() < goal {
            assert!(self.clock.next_event().is_some(), "timer not running");
            self.clock.advance_until(u64::MAX);
            engine.on_timer_interrupt();
        }
    }

    /// Run `count` periods and let the last one's pulses finish
    pub fn run_full_periods(&self, engine: &SimEngine<'_>, count: u32) {
        self.run_periods(engine, count);
        self.run_for(engine, u64::from(crate::MAX_TARGET_TICKS) + 1);
    }

    pub fn delay<'a, 'e>(&'a self, engine: &'a SimEngine<'e>) -> SimDelay<'a, 'e> {
        SimDelay {
            rig: self,
            engine,
            calls: 0,
        }
    }
}

/// [`DelayNs`] that lets simulated time pass while it waits
pub(crate) struct SimDelay<'a, 'e> {
    rig: &'a Rig,
    engine: &'a SimEngine<'e>,
    pub calls: u32,
}

impl DelayNs for SimDelay<'_, '_> {
    fn delay_ns(&mut self, ns: u32) {
        self.calls += 1;
        let ticks = u64::from(ns) * u64::from(crate::TICKS_PER_MICROSECOND) / 1000;
        self.rig.run_for(self.engine, ticks);
    }
}

/// [`DelayNs`] that returns at once without letting time pass
#[derive(Default)]
pub(crate) struct FrozenDelay {
    pub calls: u32,
}

impl DelayNs for FrozenDelay {
    fn delay_ns(&mut self, _ns: u32) {
        self.calls += 1;
    }
}
