use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel as channel;
use frame_pump::{
    Canvas, Clock, Color, DrawError, DrawOutcome, FrameCallback, FramePump, FrameSize, FrameSlot,
    ManualClock, PixelFormat, PumpConfig, Rect, RenderLoop, RenderSurface, VsyncSurface,
};

const BOUNDS: Rect = Rect::from_size(320, 240);

fn frame(sequence: u64) -> FrameSlot {
    let mut frame = FrameSlot::allocate(FrameSize::new(4, 4), PixelFormat::Rgb565).unwrap();
    frame.set_sequence(sequence);
    frame
}

fn config(capacity: usize, frame_delay_ms: u64) -> PumpConfig {
    PumpConfig {
        capacity,
        frame_delay_ms,
        debug_overlay: false,
        ..PumpConfig::default()
    }
}

fn manual_pump(capacity: usize, frame_delay_ms: u64) -> (FramePump, Arc<ManualClock>, Arc<VsyncSurface>) {
    let clock = Arc::new(ManualClock::new());
    let pump = FramePump::with_clock(config(capacity, frame_delay_ms), clock.clone()).unwrap();
    let surface = Arc::new(VsyncSurface::new(clock.clone()));
    (pump, clock, surface)
}

#[derive(Default)]
struct RecordingCanvas {
    blits: Vec<u64>,
    fills: Vec<Color>,
}

impl Canvas for RecordingCanvas {
    fn blit(&mut self, frame: &FrameSlot, _bounds: Rect) -> Result<(), DrawError> {
        self.blits.push(frame.sequence());
        Ok(())
    }

    fn fill(&mut self, _bounds: Rect, color: Color) -> Result<(), DrawError> {
        self.fills.push(color);
        Ok(())
    }
}

#[test]
fn frames_are_displayed_in_push_order_exactly_once() {
    let (pump, clock, surface) = manual_pump(4, 10);
    pump.attach(surface.clone());
    let mut canvas = RecordingCanvas::default();

    for sequence in 0..40 {
        pump.push(frame(sequence)).unwrap();
        while pump.pop(Duration::ZERO).unwrap().is_some() {}
        clock.advance(Duration::from_millis(10));
        assert_eq!(surface.tick(), 1);
        assert_eq!(pump.draw(&mut canvas, BOUNDS), DrawOutcome::Drawn(sequence));
    }

    assert_eq!(canvas.blits, (0..40).collect::<Vec<_>>());
    assert_eq!(pump.stats().advanced, 40);
}

#[test]
fn threaded_producer_sees_frames_recycled_in_display_order() {
    const FRAMES: u64 = 120;

    let pump = FramePump::new(config(16, 1)).unwrap();
    let render = RenderLoop::spawn("pump-test-render", || {}).unwrap();
    pump.attach(render.clone());

    let producer = {
        let pump = pump.clone();
        thread::spawn(move || {
            let mut recycled = Vec::new();
            for sequence in 0..FRAMES {
                pump.push(frame(sequence)).unwrap();
                while let Some(frame) = pump.pop(Duration::ZERO).unwrap() {
                    recycled.push(frame.sequence());
                }
            }
            while (recycled.len() as u64) < FRAMES - 1 {
                if let Some(frame) = pump.pop(Duration::from_millis(50)).unwrap() {
                    recycled.push(frame.sequence());
                }
            }
            recycled
        })
    };

    let recycled = producer.join().unwrap();
    assert_eq!(recycled, (0..FRAMES - 1).collect::<Vec<_>>());
    assert_eq!(pump.current_sequence(), Some(FRAMES - 1));

    pump.detach();
    render.shutdown();
}

#[test]
fn full_pending_channel_blocks_until_a_frame_is_consumed() {
    let (pump, clock, surface) = manual_pump(2, 10);

    pump.push(frame(0)).unwrap();
    pump.push(frame(1)).unwrap();
    assert!(!pump.is_scheduled());

    let (done_tx, done_rx) = channel::bounded(1);
    let blocked = {
        let pump = pump.clone();
        thread::spawn(move || {
            let result = pump.push(frame(2));
            let _ = done_tx.send(());
            result
        })
    };

    assert!(done_rx.recv_timeout(Duration::from_millis(50)).is_err());

    pump.attach(surface.clone());
    assert!(done_rx.recv_timeout(Duration::from_millis(50)).is_err());

    clock.advance(Duration::from_millis(10));
    assert_eq!(surface.tick(), 1);
    assert_eq!(pump.current_sequence(), Some(0));
    assert!(done_rx.recv_timeout(Duration::from_secs(2)).is_ok());
    blocked.join().unwrap().unwrap();

    // Nothing is recycled until the next frame replaces the current one.
    assert!(pump.pop(Duration::ZERO).unwrap().is_none());
    clock.advance(Duration::from_millis(10));
    assert_eq!(surface.tick(), 1);
    assert_eq!(pump.current_sequence(), Some(1));
    let reclaimed = pump.pop(Duration::ZERO).unwrap().unwrap();
    assert_eq!(reclaimed.sequence(), 0);
}

#[test]
fn concurrent_pushes_arm_at_most_one_callback() {
    let pump = FramePump::new(config(64, 1)).unwrap();
    let surface = Arc::new(VsyncSurface::with_system_clock());
    pump.attach(surface.clone());

    let producers: Vec<_> = (0..8u64)
        .map(|worker| {
            let pump = pump.clone();
            thread::spawn(move || {
                for i in 0..8 {
                    pump.push(frame(worker * 8 + i)).unwrap();
                }
            })
        })
        .collect();

    while producers.iter().any(|p| !p.is_finished()) {
        surface.tick_all();
        assert!(surface.pending_callbacks() <= 1);
    }
    for producer in producers {
        producer.join().unwrap();
    }
    while pump.stats().pending > 0 {
        surface.tick_all();
    }

    assert_eq!(surface.peak_pending_callbacks(), 1);
    assert_eq!(pump.stats().advanced, 64);
}

#[test]
fn idle_pump_arms_once_and_does_not_spin() {
    let pump = FramePump::new(config(4, 1)).unwrap();
    let surface = Arc::new(VsyncSurface::with_system_clock());
    pump.attach(surface.clone());
    assert_eq!(surface.scheduled_total(), 1);

    assert_eq!(surface.tick_all(), 1);
    assert!(!pump.is_scheduled());
    assert_eq!(surface.pending_callbacks(), 0);
    assert_eq!(surface.tick_all(), 0);

    assert!(pump.pop(Duration::ZERO).unwrap().is_none());
    assert!(pump.is_scheduled());
    assert_eq!(surface.scheduled_total(), 2);
}

#[test]
fn fps_converges_to_pacing_rate() {
    let (pump, clock, surface) = manual_pump(4, 33);
    pump.attach(surface.clone());

    for sequence in 0..120 {
        pump.push(frame(sequence)).unwrap();
        while pump.pop(Duration::ZERO).unwrap().is_some() {}
        clock.advance(pump.frame_delay());
        assert_eq!(surface.tick(), 1);
    }

    let expected = 1000.0 / 33.0;
    assert!((pump.fps() - expected).abs() < 0.01, "fps = {}", pump.fps());
}

#[test]
fn frame_delay_controls_next_deadline() {
    let (pump, clock, surface) = manual_pump(4, 33);
    assert_eq!(pump.frame_delay(), Duration::from_millis(33));

    pump.set_frame_delay(Duration::from_millis(50));
    assert_eq!(pump.frame_delay(), Duration::from_millis(50));

    let armed_at = clock.now();
    pump.attach(surface.clone());
    assert_eq!(surface.next_deadline(), Some(armed_at + Duration::from_millis(50)));
}

#[test]
fn drawing_before_first_frame_is_a_no_op() {
    let pump = FramePump::new(config(4, 10)).unwrap();
    let mut canvas = RecordingCanvas::default();

    assert_eq!(pump.draw(&mut canvas, BOUNDS), DrawOutcome::Idle);
    assert!(canvas.blits.is_empty());
    assert!(canvas.fills.is_empty());

    let pump = FramePump::new(PumpConfig {
        idle_fill: Some(Color::BLACK),
        ..config(4, 10)
    })
    .unwrap();
    assert_eq!(pump.draw(&mut canvas, BOUNDS), DrawOutcome::Idle);
    assert_eq!(canvas.fills, vec![Color::BLACK]);
}

#[test]
#[should_panic(expected = "recycled frame channel overflow")]
fn recycling_into_a_full_channel_is_fatal() {
    let pump = FramePump::new(config(1, 1)).unwrap();
    let surface = Arc::new(VsyncSurface::with_system_clock());
    pump.attach(surface.clone());

    for sequence in 0..3 {
        pump.push(frame(sequence)).unwrap();
        surface.tick_all();
    }
}

#[test]
fn cancel_releases_blocked_producer_calls() {
    let pump = FramePump::new(config(1, 10)).unwrap();
    pump.push(frame(0)).unwrap();

    let pusher = {
        let pump = pump.clone();
        thread::spawn(move || pump.push(frame(1)))
    };
    let popper = {
        let pump = pump.clone();
        thread::spawn(move || pump.pop(Duration::from_secs(30)))
    };

    thread::sleep(Duration::from_millis(30));
    pump.cancel();

    let rejected = pusher.join().unwrap().unwrap_err();
    assert_eq!(rejected.into_frame().sequence(), 1);
    assert!(popper.join().unwrap().is_err());
    assert!(pump.push(frame(2)).is_err());

    pump.resume();
    assert!(!pump.is_cancelled());
    assert!(pump.pop(Duration::ZERO).unwrap().is_none());
}

#[test]
fn armed_advance_survives_the_surface_going_off_screen() {
    let pump = FramePump::new(config(4, 10)).unwrap();
    let surface = Arc::new(VsyncSurface::with_system_clock());
    pump.attach(surface.clone());
    pump.push(frame(0)).unwrap();

    surface.set_attached(false);
    surface.set_attached(true);
    for sequence in 1..4 {
        pump.push(frame(sequence)).unwrap();
    }
    assert!(pump.pop(Duration::ZERO).unwrap().is_none());
    assert_eq!(surface.pending_callbacks(), 1);

    for _ in 0..4 {
        surface.tick_all();
    }
    assert_eq!(pump.current_sequence(), Some(3));
    assert_eq!(pump.stats().pending, 0);
}

#[test]
fn blocked_producer_resumes_after_surface_returns_on_screen() {
    let (pump, clock, surface) = manual_pump(1, 10);
    pump.attach(surface.clone());
    pump.push(frame(0)).unwrap();

    let blocked = {
        let pump = pump.clone();
        thread::spawn(move || pump.push(frame(1)))
    };
    thread::sleep(Duration::from_millis(20));

    surface.set_attached(false);
    clock.advance(Duration::from_millis(10));
    assert_eq!(surface.tick(), 0);
    assert_eq!(pump.current_sequence(), None);
    assert!(pump.is_scheduled());

    // Back on screen with no producer call in between.
    surface.set_attached(true);
    assert_eq!(surface.tick(), 1);
    assert_eq!(pump.current_sequence(), Some(0));
    blocked.join().unwrap().unwrap();

    clock.advance(Duration::from_millis(10));
    assert_eq!(surface.tick(), 1);
    assert_eq!(pump.current_sequence(), Some(1));
}

/// Accepts callbacks only while `open`; accepted ones wait in `armed`.
#[derive(Default)]
struct GatedSurface {
    open: AtomicBool,
    armed: Mutex<Vec<FrameCallback>>,
}

impl GatedSurface {
    fn run_all(&self) -> usize {
        let armed = std::mem::take(&mut *self.armed.lock().unwrap());
        let count = armed.len();
        for callback in armed {
            callback();
        }
        count
    }
}

impl RenderSurface for GatedSurface {
    fn schedule(&self, callback: FrameCallback, _at: Instant) -> bool {
        if !self.open.load(Ordering::SeqCst) {
            return false;
        }
        self.armed.lock().unwrap().push(callback);
        true
    }

    fn request_redraw(&self) {}

    fn is_attached(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

#[test]
fn rejected_callback_clears_the_scheduled_flag() {
    let pump = FramePump::new(config(4, 10)).unwrap();
    let surface = Arc::new(GatedSurface::default());
    pump.attach(surface.clone());
    assert!(!pump.is_scheduled());

    pump.push(frame(0)).unwrap();
    assert!(!pump.is_scheduled());

    surface.open.store(true, Ordering::SeqCst);
    assert!(pump.pop(Duration::ZERO).unwrap().is_none());
    assert!(pump.is_scheduled());
    assert_eq!(surface.run_all(), 1);
    assert_eq!(pump.current_sequence(), Some(0));
}

#[test]
fn callbacks_from_a_previous_surface_are_ignored() {
    let pump = FramePump::new(config(4, 10)).unwrap();
    let old = Arc::new(VsyncSurface::with_system_clock());
    let new = Arc::new(VsyncSurface::with_system_clock());

    pump.attach(old.clone());
    pump.detach();
    pump.attach(new.clone());
    pump.push(frame(0)).unwrap();

    old.tick_all();
    assert_eq!(pump.current_sequence(), None);
    assert!(pump.is_scheduled());

    new.tick_all();
    assert_eq!(pump.current_sequence(), Some(0));
    assert_eq!(new.redraw_requests(), 1);
    assert_eq!(old.redraw_requests(), 0);
}

#[test]
fn frame_available_reports_new_current_frame() {
    let pump = FramePump::new(config(4, 10)).unwrap();
    let surface = Arc::new(VsyncSurface::with_system_clock());
    let events = pump.frame_available();
    pump.attach(surface.clone());

    pump.push(frame(7)).unwrap();
    surface.tick_all();
    assert_eq!(events.try_recv(), Ok(7));

    pump.push(frame(8)).unwrap();
    pump.push(frame(9)).unwrap();
    surface.tick_all();
    surface.tick_all();
    // Coalesced: the undelivered notification for 8 is kept, 9 is dropped.
    assert_eq!(events.try_recv(), Ok(8));
    assert!(events.try_recv().is_err());
}

#[test]
fn reclaim_all_returns_every_frame_to_the_producer() {
    let pump = FramePump::new(config(4, 10)).unwrap();
    let surface = Arc::new(VsyncSurface::with_system_clock());
    pump.attach(surface.clone());

    for sequence in 0..4 {
        pump.push(frame(sequence)).unwrap();
    }
    surface.tick_all();
    surface.tick_all();

    let sequences: Vec<u64> = pump.reclaim_all().iter().map(FrameSlot::sequence).collect();
    assert_eq!(sequences, vec![0, 1, 2, 3]);
    assert_eq!(pump.current_sequence(), None);
    assert_eq!(pump.stats().pending, 0);
}

#[test]
fn render_surface_is_object_safe() {
    let surface: Arc<dyn RenderSurface> = Arc::new(VsyncSurface::with_system_clock());
    assert!(surface.is_attached());
}
