use {
    super::*,
    crate::backend::{STATE_ADAPTIVE_SYNC, STATE_PRESENTATION_MODE},
};

#[test]
fn buffer_only_commit_is_nonblocking() {
    let d = classify_commit(STATE_BUFFER, true, PresentationMode::Vsync, false);
    assert!(!d.needs_reconfig);
    assert!(!d.blocking);
    assert_eq!(d.flags, DRM_MODE_PAGE_FLIP_EVENT);
}

#[test]
fn enable_commit_needs_reconfig_and_blocks() {
    for bit in [STATE_ENABLED, STATE_MODE, STATE_FORMAT] {
        let d = classify_commit(bit | STATE_BUFFER, true, PresentationMode::Vsync, false);
        assert!(d.needs_reconfig);
        assert!(d.blocking);
    }
}

#[test]
fn bufferless_commit_blocks() {
    let d = classify_commit(STATE_ADAPTIVE_SYNC, true, PresentationMode::Vsync, false);
    assert!(!d.needs_reconfig);
    assert!(d.blocking);
}

#[test]
fn disabled_output_requests_no_flip_event() {
    let d = classify_commit(STATE_ENABLED, false, PresentationMode::Vsync, false);
    assert_eq!(d.flags, 0);
}

#[test]
fn immediate_presentation_requests_async_flip() {
    let d = classify_commit(
        STATE_BUFFER | STATE_PRESENTATION_MODE,
        true,
        PresentationMode::Immediate,
        false,
    );
    assert_eq!(d.flags, DRM_MODE_PAGE_FLIP_EVENT | DRM_MODE_PAGE_FLIP_ASYNC);
}

#[test]
fn test_commits_carry_no_flip_flags() {
    let d = classify_commit(STATE_BUFFER, true, PresentationMode::Immediate, true);
    assert_eq!(d.flags, 0);
    assert!(!d.blocking);
}

#[test]
fn state_mode_prefers_explicit_over_custom() {
    use crate::backend::OutputMode;
    let explicit = Rc::new(OutputMode {
        width: 1920,
        height: 1080,
        refresh_rate_millihz: 60_000,
        preferred: true,
        info: None,
    });
    let custom = Rc::new(OutputMode {
        width: 640,
        height: 480,
        refresh_rate_millihz: 60_000,
        preferred: false,
        info: None,
    });
    let mut state = OutputState::default();
    assert!(state.mode().is_none());
    state.custom_mode = Some(custom.clone());
    assert_eq!(state.mode().unwrap().width, 640);
    state.mode = Some(explicit);
    assert_eq!(state.mode().unwrap().width, 1920);
}
