//! Protocol tests for the frame loop, driven against the headless backend.

use prism_frame::{
    AcquireOutcome, FrameBackend, FrameEvent, FrameLoop, HeadlessFrames, PresentOutcome,
};

fn headless_loop(slots: usize, images: usize) -> FrameLoop {
    FrameLoop::new(FrameBackend::Headless(HeadlessFrames::new(slots, images)))
}

fn run_frame(frames: &mut FrameLoop) {
    let frame = frames
        .begin_frame()
        .expect("begin_frame failed")
        .expect("frame unexpectedly skipped");
    assert_eq!(frame.slot, frames.current_slot());
    frames.end_frame().expect("end_frame failed");
}

fn events(frames: &FrameLoop) -> Vec<FrameEvent> {
    frames.backend().as_headless().unwrap().events().to_vec()
}

fn rebuild_count(frames: &FrameLoop) -> usize {
    frames.backend().as_headless().unwrap().rebuild_count()
}

#[test]
fn slot_index_is_frame_count_mod_slot_count() {
    let mut frames = headless_loop(2, 3);

    for k in 0..6usize {
        let frame = frames.begin_frame().unwrap().unwrap();
        assert_eq!(frame.slot, k % 2);
        frames.end_frame().unwrap();
        assert_eq!(frames.current_slot(), (k + 1) % 2);
    }
}

#[test]
fn one_cycle_orders_fence_before_recording() {
    let mut frames = headless_loop(2, 2);
    run_frame(&mut frames);
    run_frame(&mut frames);

    let expected = vec![
        FrameEvent::WaitFence { slot: 0 },
        FrameEvent::Acquire { slot: 0 },
        FrameEvent::ResetFence { slot: 0 },
        FrameEvent::BeginRecording { slot: 0 },
        FrameEvent::EndRecording { slot: 0 },
        FrameEvent::Submit { slot: 0 },
        FrameEvent::Present {
            slot: 0,
            image_index: 0,
        },
        FrameEvent::WaitFence { slot: 1 },
        FrameEvent::Acquire { slot: 1 },
        FrameEvent::ResetFence { slot: 1 },
        FrameEvent::BeginRecording { slot: 1 },
        FrameEvent::EndRecording { slot: 1 },
        FrameEvent::Submit { slot: 1 },
        FrameEvent::Present {
            slot: 1,
            image_index: 1,
        },
    ];
    assert_eq!(events(&frames), expected);
}

#[test]
fn command_buffer_never_reset_before_fence_wait() {
    let mut frames = headless_loop(3, 3);
    for _ in 0..9 {
        run_frame(&mut frames);
    }

    // For every slot cycle: the wait must precede the reset, and the reset
    // must precede reuse of the command buffer
    let log = events(&frames);
    for slot in 0..3usize {
        let mut waited = false;
        for event in &log {
            match *event {
                FrameEvent::WaitFence { slot: s } if s == slot => waited = true,
                FrameEvent::ResetFence { slot: s } if s == slot => {
                    assert!(waited, "slot {} fence reset without a preceding wait", slot);
                }
                FrameEvent::BeginRecording { slot: s } if s == slot => {
                    assert!(waited, "slot {} recording began without a fence wait", slot);
                    waited = false;
                }
                _ => {}
            }
        }
    }
}

#[test]
fn out_of_date_acquire_skips_one_frame_and_rebuilds_once() {
    let mut frames = headless_loop(2, 3);
    frames
        .backend_mut()
        .as_headless_mut()
        .unwrap()
        .script_acquire(AcquireOutcome::OutOfDate);

    // The failed acquire skips the frame without advancing the slot
    assert!(frames.begin_frame().unwrap().is_none());
    assert_eq!(rebuild_count(&frames), 1);
    assert_eq!(frames.current_slot(), 0);

    // The next tick proceeds normally on the same slot
    let frame = frames.begin_frame().unwrap().unwrap();
    assert_eq!(frame.slot, 0);
    frames.end_frame().unwrap();
    assert_eq!(rebuild_count(&frames), 1);
}

#[test]
fn seven_frames_with_three_slots_cycle_1_2_0_1_2_0_1() {
    let mut frames = headless_loop(3, 3);

    let mut slots_after_end = Vec::new();
    for _ in 0..7 {
        frames.begin_frame().unwrap().unwrap();
        frames.end_frame().unwrap();
        slots_after_end.push(frames.current_slot());
    }

    assert_eq!(slots_after_end, vec![1, 2, 0, 1, 2, 0, 1]);
}

#[test]
fn out_of_date_on_fourth_acquire_recovers_on_fifth() {
    let mut frames = headless_loop(3, 3);

    for _ in 0..3 {
        run_frame(&mut frames);
    }
    assert_eq!(rebuild_count(&frames), 0);

    frames
        .backend_mut()
        .as_headless_mut()
        .unwrap()
        .script_acquire(AcquireOutcome::OutOfDate);

    // Call 4: no frame this tick, exactly one rebuild
    assert!(frames.begin_frame().unwrap().is_none());
    assert_eq!(rebuild_count(&frames), 1);

    // Call 5: normal acquire from the freshly rebuilt image set
    let frame = frames.begin_frame().unwrap().unwrap();
    assert_eq!(frame.slot, 0);
    assert_eq!(frame.image_index, 0);
    frames.end_frame().unwrap();
    assert_eq!(rebuild_count(&frames), 1);
}

#[test]
fn stale_present_rebuilds_and_still_advances() {
    let mut frames = headless_loop(2, 3);
    frames
        .backend_mut()
        .as_headless_mut()
        .unwrap()
        .script_present(PresentOutcome::Stale);

    frames.begin_frame().unwrap().unwrap();
    frames.end_frame().unwrap();

    assert_eq!(rebuild_count(&frames), 1);
    // The discarded frame still advances the slot cursor
    assert_eq!(frames.current_slot(), 1);
}

#[test]
fn suboptimal_acquire_still_renders_the_frame() {
    let mut frames = headless_loop(2, 3);
    frames
        .backend_mut()
        .as_headless_mut()
        .unwrap()
        .script_acquire(AcquireOutcome::Ready {
            image_index: 1,
            suboptimal: true,
        });

    let frame = frames.begin_frame().unwrap().unwrap();
    assert_eq!(frame.image_index, 1);
    frames.end_frame().unwrap();
    assert_eq!(rebuild_count(&frames), 0);
}

#[test]
fn repeated_rebuild_preserves_the_image_set_shape() {
    let mut frames = headless_loop(2, 3);
    let images_before = frames.backend().image_count();

    frames.backend_mut().rebuild().unwrap();
    frames.backend_mut().rebuild().unwrap();

    assert_eq!(frames.backend().image_count(), images_before);
    assert_eq!(rebuild_count(&frames), 2);

    // Acquire still cycles the same image range
    let frame = frames.begin_frame().unwrap().unwrap();
    assert!((frame.image_index as usize) < images_before);
}

#[test]
fn slot_count_and_image_count_are_independent() {
    let frames = headless_loop(2, 4);
    assert_eq!(frames.slot_count(), 2);
    assert_eq!(frames.backend().image_count(), 4);
}
