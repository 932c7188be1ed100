use {
    super::*,
    crate::video::drm::sys::{DRM_MODE_FLAG_INTERLACE, DRM_MODE_FLAG_PHSYNC},
};

#[test]
fn cvt_1080p60() {
    // Reference values for CVT 1920x1080 @ 60 Hz with standard blanking.
    let mode = calculate_mode(1920, 1080, 60_000);
    assert_eq!(mode.clock, 173_000);
    assert_eq!(mode.hdisplay, 1920);
    assert_eq!(mode.hsync_start, 2048);
    assert_eq!(mode.hsync_end, 2248);
    assert_eq!(mode.htotal, 2576);
    assert_eq!(mode.vdisplay, 1080);
    assert_eq!(mode.vsync_start, 1083);
    assert_eq!(mode.vsync_end, 1088);
    assert_eq!(mode.vtotal, 1120);
    assert_eq!(mode.vrefresh, 60);
}

#[test]
fn polarity_is_nhsync_pvsync() {
    let mode = calculate_mode(2560, 1440, 144_000);
    assert_eq!(mode.flags & DRM_MODE_FLAG_NHSYNC, DRM_MODE_FLAG_NHSYNC);
    assert_eq!(mode.flags & DRM_MODE_FLAG_PVSYNC, DRM_MODE_FLAG_PVSYNC);
    assert_eq!(mode.flags & DRM_MODE_FLAG_PHSYNC, 0);
    assert_eq!(mode.flags & DRM_MODE_FLAG_INTERLACE, 0);
}

#[test]
fn name_is_width_x_height() {
    let mode = calculate_mode(2560, 1440, 144_000);
    assert_eq!(mode.name, "2560x1440");
}

#[test]
fn zero_refresh_defaults_to_60hz() {
    let mode = calculate_mode(1280, 720, 0);
    assert_eq!(mode.vrefresh, 60);
}

#[test]
fn timings_are_ordered() {
    for (w, h, r) in [
        (1920, 1080, 60_000),
        (2560, 1440, 144_000),
        (3840, 2160, 30_000),
        (1366, 768, 60_000),
        (640, 480, 75_000),
    ] {
        let mode = calculate_mode(w, h, r);
        assert!(mode.hdisplay <= mode.hsync_start);
        assert!(mode.hsync_start < mode.hsync_end);
        assert!(mode.hsync_end <= mode.htotal);
        assert!(mode.vdisplay < mode.vsync_start);
        assert!(mode.vsync_start < mode.vsync_end);
        assert!(mode.vsync_end < mode.vtotal);
        assert!(mode.clock > 0);
    }
}

#[test]
fn synthesized_refresh_close_to_requested() {
    for (w, h, r) in [(1920, 1080, 60_000u32), (2560, 1440, 144_000), (1280, 1024, 75_000)] {
        let mode = calculate_mode(w, h, r);
        let refresh = mode.refresh_rate_millihz();
        let diff = refresh.abs_diff(r);
        // The clock is quantized to 250 kHz, allow 1% error.
        assert!(diff * 100 < r, "{}x{}@{}: got {}", w, h, r, refresh);
    }
}

#[test]
fn vsync_width_follows_aspect_ratio() {
    assert_eq!(calculate_mode(640, 480, 60_000).vsync_end - calculate_mode(640, 480, 60_000).vsync_start, 4);
    assert_eq!(calculate_mode(1920, 1080, 60_000).vsync_end - calculate_mode(1920, 1080, 60_000).vsync_start, 5);
    assert_eq!(calculate_mode(1920, 1200, 60_000).vsync_end - calculate_mode(1920, 1200, 60_000).vsync_start, 6);
    assert_eq!(calculate_mode(1280, 1024, 60_000).vsync_end - calculate_mode(1280, 1024, 60_000).vsync_start, 7);
}
