use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use panel_deck::device::{
    decode_pages, logical_to_raw, MockTransport, PagePair, PanelController, PanelOptions,
    PixelFormat, BMP_HEADER, BUTTON_STATE_REPORT_ID, ICON_PIXELS, PAGE1_PIXELS,
    PAGE_PACKET_SIZE, RESET_REPORT,
};
use panel_deck::events::{EventKind, PanelEvent, ThrottlePolicy, Topic};
use panel_deck::input::ButtonState;
use panel_deck::PanelError;

fn panel() -> (Arc<MockTransport>, PanelController) {
    let mock = Arc::new(MockTransport::new());
    let panel = PanelController::new(mock.clone(), PanelOptions::default());
    (mock, panel)
}

fn state_report(pressed_logical: &[u8]) -> Vec<u8> {
    let mut report = vec![0u8; 17];
    report[0] = BUTTON_STATE_REPORT_ID;
    for &button in pressed_logical {
        report[logical_to_raw(button).unwrap() as usize] = 1;
    }
    report
}

/// Records every event it sees
fn recorder(panel: &PanelController, topic: Topic) -> Arc<Mutex<Vec<PanelEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    panel.on(
        topic,
        move |event: &PanelEvent| s.lock().unwrap().push(event.clone()),
        ThrottlePolicy::none(),
    );
    seen
}

#[tokio::test]
async fn test_draw_red_on_button_one_is_byte_exact() {
    let (mock, panel) = panel();
    panel.draw_color(0xff0000, 1).await.unwrap();

    let reports = mock.output_reports();
    assert_eq!(reports.len(), 2);

    // Logical 1 is the top-left key, raw 5 on the wire
    let mut page1 = vec![0x02, 0x01, 0x01, 0x00, 0x00, 0x05];
    page1.resize(16, 0);
    page1.extend_from_slice(&BMP_HEADER);
    for _ in 0..PAGE1_PIXELS {
        page1.extend_from_slice(&[0x00, 0x00, 0xff]);
    }
    page1.resize(PAGE_PACKET_SIZE, 0);

    let mut page2 = vec![0x02, 0x01, 0x02, 0x00, 0x01, 0x05];
    page2.resize(16, 0);
    for _ in 0..ICON_PIXELS - PAGE1_PIXELS {
        page2.extend_from_slice(&[0x00, 0x00, 0xff]);
    }
    page2.resize(PAGE_PACKET_SIZE, 0);

    assert_eq!(reports[0], page1);
    assert_eq!(reports[1], page2);

    let decoded = decode_pages(&PagePair {
        page1: reports[0].clone(),
        page2: reports[1].clone(),
    });
    assert_eq!(decoded.len(), ICON_PIXELS * 3);
    assert!(decoded.chunks_exact(3).all(|p| p == [0xff, 0x00, 0x00]));
}

#[tokio::test]
async fn test_rgba_buffer_matches_rgb_buffer() {
    let (mock, panel) = panel();
    let rgb: Vec<u8> = (0..ICON_PIXELS).flat_map(|i| [i as u8, 0x10, 0x20]).collect();
    let rgba: Vec<u8> = (0..ICON_PIXELS)
        .flat_map(|i| [i as u8, 0x10, 0x20, 0x7f])
        .collect();

    panel.draw_buffer(&rgb, 9, PixelFormat::Rgb).await.unwrap();
    panel.draw_buffer(&rgba, 9, PixelFormat::Rgba).await.unwrap();

    let reports = mock.output_reports();
    assert_eq!(reports[0], reports[2]);
    assert_eq!(reports[1], reports[3]);
}

#[tokio::test]
async fn test_concurrent_draws_keep_page_pairs_together() {
    let (mock, panel) = panel();
    let panel = Arc::new(panel);

    let mut tasks = Vec::new();
    for button in 1..=15u8 {
        let panel = panel.clone();
        tasks.push(tokio::spawn(async move {
            panel.draw_color(u32::from(button) * 0x010101, button).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let reports = mock.output_reports();
    assert_eq!(reports.len(), 30);
    for pair in reports.chunks_exact(2) {
        assert_eq!(pair[0][2], 1, "page 1 first");
        assert_eq!(pair[1][2], 2, "page 2 second");
        assert_eq!(pair[0][5], pair[1][5], "same key in both pages");
    }
}

#[tokio::test]
async fn test_press_and_release_edges() {
    let (_mock, panel) = panel();
    let presses = recorder(&panel, Topic::Category(EventKind::Press));
    let releases = recorder(&panel, Topic::Category(EventKind::Release));
    let states = recorder(&panel, Topic::Category(EventKind::State));

    panel.handle_input_report(&state_report(&[7]));
    panel.handle_input_report(&state_report(&[7]));
    panel.handle_input_report(&state_report(&[]));

    assert_eq!(*presses.lock().unwrap(), vec![PanelEvent::Press(7)]);
    assert_eq!(*releases.lock().unwrap(), vec![PanelEvent::Release(7)]);
    // One state event per report, even without edges
    assert_eq!(states.lock().unwrap().len(), 3);
    assert_eq!(panel.button_state().get(7), Some(ButtonState::Released));
}

#[tokio::test]
async fn test_button_topic_before_category_topic() {
    let (_mock, panel) = panel();
    let order = Arc::new(Mutex::new(Vec::new()));

    let o = order.clone();
    panel.on(
        "press".parse().unwrap(),
        move |_: &PanelEvent| o.lock().unwrap().push("press"),
        ThrottlePolicy::none(),
    );
    let o = order.clone();
    panel.on(
        "press:3".parse().unwrap(),
        move |_: &PanelEvent| o.lock().unwrap().push("press:3"),
        ThrottlePolicy::none(),
    );

    panel.handle_input_report(&state_report(&[3]));
    assert_eq!(*order.lock().unwrap(), vec!["press:3", "press"]);
}

#[tokio::test]
async fn test_unrelated_reports_are_ignored() {
    let (_mock, panel) = panel();
    let states = recorder(&panel, Topic::Category(EventKind::State));

    let mut other = state_report(&[1]);
    other[0] = 0x02;
    panel.handle_input_report(&other);
    panel.handle_input_report(&[BUTTON_STATE_REPORT_ID, 1, 0]);

    assert!(states.lock().unwrap().is_empty());
    assert!(panel.button_state().pressed().is_empty());
}

#[tokio::test]
async fn test_listener_task_delivers_transport_input() {
    let (mock, panel) = panel();
    let presses = recorder(&panel, Topic::Button(EventKind::Press, 12));

    assert!(panel.start_listening());
    assert!(!panel.start_listening());

    mock.input_sender().send(state_report(&[12])).unwrap();
    for _ in 0..100 {
        if !presses.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(*presses.lock().unwrap(), vec![PanelEvent::Press(12)]);
}

#[tokio::test]
async fn test_remove_all_listeners() {
    let (_mock, panel) = panel();
    let count = Arc::new(AtomicUsize::new(0));
    for topic in ["press", "release", "state", "press:1"] {
        let c = count.clone();
        panel.on(
            topic.parse().unwrap(),
            move |_: &PanelEvent| {
                c.fetch_add(1, Ordering::SeqCst);
            },
            ThrottlePolicy::default(),
        );
    }

    panel.remove_all_listeners();
    panel.handle_input_report(&state_report(&[1]));
    panel.handle_input_report(&state_report(&[]));
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_throttled_press_listener() {
    let (_mock, panel) = panel();
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    panel.on(
        Topic::Category(EventKind::Press),
        move |_: &PanelEvent| {
            c.fetch_add(1, Ordering::SeqCst);
        },
        ThrottlePolicy::default(),
    );

    // Three press edges within 50ms
    for _ in 0..3 {
        panel.handle_input_report(&state_report(&[2]));
        panel.handle_input_report(&state_report(&[]));
        tokio::time::advance(Duration::from_millis(10)).await;
    }
    assert_eq!(count.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_millis(200)).await;
    panel.handle_input_report(&state_report(&[2]));
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_unsubscribe_single_listener() {
    let (_mock, panel) = panel();
    let kept = recorder(&panel, Topic::Category(EventKind::Press));
    let dropped = Arc::new(AtomicUsize::new(0));
    let d = dropped.clone();
    let id = panel.on(
        Topic::Category(EventKind::Press),
        move |_: &PanelEvent| {
            d.fetch_add(1, Ordering::SeqCst);
        },
        ThrottlePolicy::none(),
    );

    assert!(panel.off(id));
    panel.handle_input_report(&state_report(&[4]));
    assert_eq!(kept.lock().unwrap().len(), 1);
    assert_eq!(dropped.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_draw_image_file_uses_cache() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("icon.png");
    image::RgbaImage::from_pixel(72, 72, image::Rgba([10, 20, 30, 255]))
        .save(&path)
        .unwrap();

    let (mock, panel) = panel();
    panel.draw_image_file(&path, 2).await.unwrap();
    std::fs::remove_file(&path).unwrap();
    panel.draw_image_file(&path, 3).await.unwrap();

    let reports = mock.output_reports();
    assert_eq!(reports.len(), 4);
    let decoded = decode_pages(&PagePair {
        page1: reports[2].clone(),
        page2: reports[3].clone(),
    });
    assert!(decoded.chunks_exact(3).all(|p| p == [10, 20, 30]));
}

#[tokio::test]
async fn test_invalid_image_button_skips_decode() {
    let (mock, panel) = panel();
    let err = panel
        .draw_image_file("/does/not/exist.png", 99)
        .await
        .unwrap_err();
    assert!(matches!(err, PanelError::InvalidButtonNumber(99)));
    assert!(mock.output_reports().is_empty());
}

#[tokio::test]
async fn test_shutdown_resets_and_closes() {
    let (mock, panel) = panel();
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    panel.on(
        Topic::Category(EventKind::State),
        move |_: &PanelEvent| {
            c.fetch_add(1, Ordering::SeqCst);
        },
        ThrottlePolicy::none(),
    );
    panel.start_listening();

    panel.shutdown().await;

    assert_eq!(mock.feature_reports(), vec![RESET_REPORT.to_vec()]);
    assert!(mock.is_closed());
    assert!(matches!(
        panel.draw_color(0xffffff, 1).await,
        Err(PanelError::DeviceIo(_))
    ));

    // Listeners are gone after shutdown
    panel.handle_input_report(&state_report(&[1]));
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_off_cancels_pending_trailing_call() {
    let (_mock, panel) = panel();
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    let id = panel.on(
        Topic::Category(EventKind::Release),
        move |_: &PanelEvent| {
            c.fetch_add(1, Ordering::SeqCst);
        },
        ThrottlePolicy::default().with_trailing(true),
    );

    // Leading run, then a second release waiting for the trailing edge
    panel.handle_input_report(&state_report(&[5]));
    panel.handle_input_report(&state_report(&[]));
    panel.handle_input_report(&state_report(&[5]));
    panel.handle_input_report(&state_report(&[]));
    assert_eq!(count.load(Ordering::SeqCst), 1);

    assert!(panel.off(id));
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_page_switch_from_listener_silences_old_page() {
    let (_mock, panel) = panel();
    let panel = Arc::new(panel);
    let count = Arc::new(AtomicUsize::new(0));

    let switcher = Arc::downgrade(&panel);
    panel.on(
        "press:3".parse().unwrap(),
        move |_: &PanelEvent| {
            if let Some(panel) = switcher.upgrade() {
                panel.remove_all_listeners();
            }
        },
        ThrottlePolicy::none(),
    );
    let c = count.clone();
    panel.on(
        "press".parse().unwrap(),
        move |_: &PanelEvent| {
            c.fetch_add(1, Ordering::SeqCst);
        },
        ThrottlePolicy::none(),
    );

    panel.handle_input_report(&state_report(&[3]));
    assert_eq!(count.load(Ordering::SeqCst), 0);
}
