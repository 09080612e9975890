use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use calloop::timer::{TimeoutAction, Timer};
use calloop::{LoopHandle, RegistrationToken};

use crate::ticker::{Ticker, TickerState};

/// Drive `ticker` from a calloop timer firing at its target frame interval.
///
/// The timer reschedules itself after every frame and drops itself once the
/// ticker is stopped, so start the ticker before the loop first dispatches.
pub fn insert_ticker<Data>(
    handle: &LoopHandle<'_, Data>,
    ticker: Rc<RefCell<Ticker>>,
) -> Result<RegistrationToken, calloop::Error> {
    let interval = ticker.borrow().config().frame_interval();
    let timer = Timer::from_duration(interval);

    handle
        .insert_source(timer, move |_deadline, _, _data| {
            let Ok(mut ticker) = ticker.try_borrow_mut() else {
                log::warn!("ticker busy, skipping frame");
                return TimeoutAction::ToDuration(interval);
            };
            if ticker.state() == TickerState::Stopped {
                log::debug!("ticker stopped, dropping frame timer");
                return TimeoutAction::Drop;
            }
            ticker.on_frame(Instant::now());
            if ticker.state() == TickerState::Stopped {
                TimeoutAction::Drop
            } else {
                TimeoutAction::ToDuration(interval)
            }
        })
        .map_err(|e| e.error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Duration;

    use calloop::EventLoop;

    use crate::ticker::TickerConfig;

    #[test]
    fn test_timer_drives_ticker_until_stopped() {
        let mut event_loop: EventLoop<'_, ()> = EventLoop::try_new().unwrap();
        let ticker = Rc::new(RefCell::new(Ticker::new(TickerConfig::default().fps(200))));

        let frames = Rc::new(Cell::new(0u32));
        {
            let mut t = ticker.borrow_mut();
            let stop = t.stop_handle();
            let count = frames.clone();
            t.add_listener(move |_| {
                count.set(count.get() + 1);
                if count.get() == 3 {
                    stop.stop();
                }
            });
            t.start();
        }

        insert_ticker(&event_loop.handle(), ticker.clone()).unwrap();
        for _ in 0..50 {
            if ticker.borrow().state() == TickerState::Stopped {
                break;
            }
            event_loop
                .dispatch(Some(Duration::from_millis(20)), &mut ())
                .unwrap();
        }

        assert_eq!(frames.get(), 3);
        assert_eq!(ticker.borrow().state(), TickerState::Stopped);
    }
}
