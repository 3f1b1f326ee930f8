// Copyright 2026 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pixel scenarios for root layer geometry, stacking and latching.

mod common;

use std::f64::consts::FRAC_1_SQRT_2;

use common::{BLACK, BLUE, DISPLAY, FG_Z, GREEN, RED, Stage};
use sediment_compositor::ApplyMode;
use sediment_core::buffer::ScalingMode;
use sediment_core::geometry::{IntRect, LayerFlags};
use sediment_core::capture::CompositionContext;
use sediment_core::layer::Stacking;
use sediment_core::output::LayerStackId;
use sediment_core::scene::GeometryPhase;
use sediment_core::transaction::{DeferUntil, Transaction};
use sediment_render::Rgba8;

const GREY_MID: Rgba8 = Rgba8::rgb(127, 127, 127);

#[test]
fn initial_frame_shows_fg_over_bg() {
    let mut stage = Stage::new();
    let shot = stage.screenshot();
    shot.expect_bg(0, 12);
    shot.expect_region(64, 64, 128, 128, RED);
    shot.expect_bg(145, 145);
    shot.expect_bg(DISPLAY - 1, DISPLAY - 1);
}

#[test]
fn position_moves_the_layer() {
    let mut stage = Stage::new();
    let fg = stage.fg;
    stage.apply(Transaction::new().set_position(fg, 128.0, 128.0));

    let shot = stage.screenshot();
    shot.expect_bg(64, 64);
    shot.expect_bg(127, 127);
    shot.expect_region(128, 128, 192, 192, RED);
    shot.expect_bg(192, 192);
}

#[test]
fn fractional_positions_round_at_pixel_centers() {
    let mut stage = Stage::new();
    let fg = stage.fg;

    stage.apply(Transaction::new().set_position(fg, 64.4, 64.4));
    let shot = stage.screenshot();
    shot.expect_fg(64, 64);
    shot.expect_fg(127, 127);
    shot.expect_bg(128, 128);

    stage.apply(Transaction::new().set_position(fg, 64.6, 64.6));
    let shot = stage.screenshot();
    shot.expect_bg(64, 64);
    shot.expect_fg(65, 65);
    shot.expect_fg(128, 128);
    shot.expect_bg(129, 129);
}

#[test]
fn resize_waits_for_a_matching_buffer() {
    let mut stage = Stage::new();
    let fg = stage.fg;
    stage.apply(Transaction::new().set_size(fg, 128, 128));

    assert_eq!(
        stage.compositor.geometry_phase(fg).unwrap(),
        GeometryPhase::PendingBufferLatched
    );
    assert_eq!(stage.compositor.requested_size(fg).unwrap().width, 128);
    let shot = stage.screenshot();
    shot.expect_fg(127, 127);
    shot.expect_bg(128, 128);

    // A buffer of the old size is counted but not shown.
    let before = stage.compositor.latched_frame(fg).unwrap();
    let composition = stage.present(fg, 64, 64, GREEN);
    assert_eq!((composition.latched, composition.rejected), (0, 1));
    assert_eq!(stage.compositor.latched_frame(fg).unwrap(), before + 1);
    stage.screenshot().expect_fg(64, 64);

    stage.present(fg, 128, 128, RED);
    assert_eq!(
        stage.compositor.geometry_phase(fg).unwrap(),
        GeometryPhase::Committed
    );
    let shot = stage.screenshot();
    shot.expect_region(64, 64, 192, 192, RED);
    shot.expect_bg(192, 192);
}

#[test]
fn geometry_applies_with_resize_holds_position() {
    let mut stage = Stage::new();
    let fg = stage.fg;
    stage.apply(
        Transaction::new()
            .set_size(fg, 128, 128)
            .set_position(fg, 100.0, 100.0)
            .set_geometry_applies_with_resize(fg),
    );

    let shot = stage.screenshot();
    shot.expect_fg(64, 64);
    shot.expect_bg(128, 128);
    assert_eq!(stage.compositor.geometry(fg).unwrap().position.x, 64.0);

    // Later positions replace the held one but stay held.
    stage.apply(Transaction::new().set_position(fg, 96.0, 96.0));
    stage.screenshot().expect_fg(64, 64);

    stage.present(fg, 128, 128, RED);
    let shot = stage.screenshot();
    shot.expect_bg(95, 95);
    shot.expect_region(96, 96, 224, 224, RED);
    shot.expect_bg(224, 224);
}

#[test]
fn crop_applies_immediately_without_a_resize() {
    let mut stage = Stage::new();
    let fg = stage.fg;
    stage.apply(Transaction::new().set_crop(fg, IntRect::new(0, 0, 32, 32)));

    let shot = stage.screenshot();
    shot.expect_region(64, 64, 96, 96, RED);
    shot.expect_bg(96, 96);
    shot.expect_bg(100, 70);

    stage.apply(Transaction::new().set_crop(fg, IntRect::new(0, 0, -1, -1)));
    stage.screenshot().expect_fg(127, 127);
}

#[test]
fn crop_latches_with_resize() {
    let mut stage = Stage::new();
    let fg = stage.fg;
    stage.apply(
        Transaction::new()
            .set_size(fg, 128, 128)
            .set_crop(fg, IntRect::new(0, 0, 63, 63))
            .set_geometry_applies_with_resize(fg),
    );
    stage.screenshot().expect_fg(127, 127);

    stage.present(fg, 128, 128, RED);
    let shot = stage.screenshot();
    shot.expect_fg(126, 126);
    shot.expect_bg(127, 127);
}

#[test]
fn crop_outside_bounds_draws_nothing() {
    let mut stage = Stage::new();
    let fg = stage.fg;
    stage.apply(Transaction::new().set_crop(fg, IntRect::new(128, 128, 160, 160)));
    let shot = stage.screenshot();
    shot.expect_region(64, 64, 128, 128, BLUE);
}

#[test]
fn final_crop_is_in_screen_space_for_roots() {
    let mut stage = Stage::new();
    let fg = stage.fg;
    stage.apply(Transaction::new().set_final_crop(fg, IntRect::new(0, 0, 96, 96)));

    let shot = stage.screenshot();
    shot.expect_region(64, 64, 96, 96, RED);
    shot.expect_bg(96, 96);

    stage.apply(Transaction::new().set_final_crop(fg, IntRect::new(0, 0, -1, -1)));
    stage.screenshot().expect_fg(127, 127);
}

#[test]
fn final_crop_latches_with_resize() {
    let mut stage = Stage::new();
    let fg = stage.fg;
    stage.apply(
        Transaction::new()
            .set_size(fg, 128, 128)
            .set_final_crop(fg, IntRect::new(64, 64, 127, 127))
            .set_geometry_applies_with_resize(fg),
    );
    stage.screenshot().expect_fg(127, 127);

    stage.present(fg, 128, 128, RED);
    let shot = stage.screenshot();
    shot.expect_fg(126, 126);
    shot.expect_bg(127, 127);
}

#[test]
fn alpha_blends_over_the_background() {
    let mut stage = Stage::new();
    let fg = stage.fg;
    stage.apply(Transaction::new().set_alpha(fg, 0.75));
    stage
        .screenshot()
        .expect_region(64, 64, 128, 128, Rgba8::rgb(162, 63, 96));

    stage.apply(Transaction::new().set_alpha(fg, 0.0));
    stage.screenshot().expect_region(64, 64, 128, 128, BLUE);
}

#[test]
fn matrix_rotates_about_the_layer_origin() {
    let mut stage = Stage::new();
    let fg = stage.fg;
    stage.apply(Transaction::new().set_matrix(
        fg,
        FRAC_1_SQRT_2,
        FRAC_1_SQRT_2,
        -FRAC_1_SQRT_2,
        FRAC_1_SQRT_2,
    ));

    let shot = stage.screenshot();
    shot.expect_fg(91, 96);
    shot.expect_bg(96, 91);
    shot.expect_fg(64, 70);
    shot.expect_bg(70, 64);
}

#[test]
fn zero_matrix_draws_nothing() {
    let mut stage = Stage::new();
    let fg = stage.fg;
    stage.apply(Transaction::new().set_matrix(fg, 0.0, 0.0, 0.0, 0.0));
    stage.screenshot().expect_region(64, 64, 128, 128, BLUE);
}

#[test]
fn layer_stack_selects_the_display() {
    let mut stage = Stage::new();
    let fg = stage.fg;
    stage.apply(Transaction::new().set_layer_stack(fg, LayerStackId(1)));
    stage.screenshot().expect_bg(64, 64);

    let shot = stage.capture(&CompositionContext::new(LayerStackId(1), DISPLAY, DISPLAY));
    shot.expect_fg(64, 64);
    shot.expect_pixel(0, 0, BLACK);
}

#[test]
fn hide_and_show() {
    let mut stage = Stage::new();
    let fg = stage.fg;
    stage.apply(Transaction::new().hide(fg));
    stage.screenshot().expect_bg(64, 64);

    stage.apply(Transaction::new().show(fg));
    stage.screenshot().expect_fg(64, 64);

    stage.apply(Transaction::new().set_flags(fg, LayerFlags::HIDDEN));
    stage.screenshot().expect_bg(64, 64);
}

#[test]
fn relative_layer_follows_its_target() {
    let mut stage = Stage::new();
    let (bg, fg) = (stage.bg, stage.fg);
    let rel = stage.color_layer("rel", 32, 32, GREEN);
    stage.apply(
        Transaction::new()
            .set_position(rel, 64.0, 64.0)
            .set_relative_layer(rel, fg, -1),
    );
    stage.screenshot().expect_fg(64, 64);

    stage.apply(Transaction::new().set_relative_layer(rel, fg, 1));
    stage.screenshot().expect_pixel(64, 64, GREEN);

    // Above bg but still under fg.
    stage.apply(Transaction::new().set_relative_layer(rel, bg, 1));
    stage.screenshot().expect_fg(64, 64);

    // Hiding the target does not hide the relative.
    stage.apply(Transaction::new().hide(fg).hide(bg));
    let shot = stage.screenshot();
    shot.expect_pixel(64, 64, GREEN);
    shot.expect_pixel(0, 0, BLACK);

    stage.apply(Transaction::new().show(fg).show(bg).set_layer(rel, i32::MAX));
    stage.screenshot().expect_pixel(64, 64, GREEN);
    assert_eq!(
        stage.compositor.with_scene(|s| s.layers().stacking(rel).unwrap()),
        Stacking::Absolute
    );
}

#[test]
fn relative_layers_group_with_their_target() {
    let mut stage = Stage::new();
    let fg = stage.fg;
    // A root between fg and bg in absolute z.
    let mid = stage.color_layer("mid", 32, 32, GREY_MID);
    let rel = stage.color_layer("rel", 16, 16, GREEN);
    stage.apply(
        Transaction::new()
            .set_layer(mid, FG_Z - 1)
            .set_position(mid, 64.0, 64.0)
            .set_position(rel, 64.0, 64.0)
            .set_relative_layer(rel, fg, -1),
    );
    // rel paints just below fg, above mid; fg still covers it.
    stage.screenshot().expect_fg(64, 64);
    assert_eq!(
        stage.compositor.paint_order()[1..],
        [mid, rel, fg],
        "relative layers sit inside the target's group"
    );

    stage.apply(Transaction::new().hide(fg));
    let shot = stage.screenshot();
    shot.expect_pixel(64, 64, GREEN);
    shot.expect_pixel(80, 80, GREY_MID);
}

#[test]
fn relative_layer_cycles_are_refused() {
    let stage = Stage::new();
    let (bg, fg) = (stage.bg, stage.fg);
    stage.apply(Transaction::new().set_relative_layer(fg, bg, 1));
    let report = stage
        .compositor
        .apply(
            Transaction::new().set_relative_layer(bg, fg, 1),
            ApplyMode::Synchronous,
        )
        .unwrap()
        .unwrap();
    assert_eq!(report.errors.len(), 1);
}

#[test]
fn destroying_a_relative_target_orphans_the_layer() {
    let mut stage = Stage::new();
    let fg = stage.fg;
    let rel = stage.color_layer("rel", 32, 32, GREEN);
    stage.apply(Transaction::new().set_relative_layer(rel, fg, 1));
    stage.screenshot().expect_pixel(0, 0, GREEN);

    stage.client.destroy_layer(fg).unwrap();
    stage.compose();
    stage.screenshot().expect_bg(0, 0);
    assert_eq!(
        stage.compositor.with_scene(|s| s.layers().stacking(rel).unwrap()),
        Stacking::Orphaned
    );

    stage.apply(Transaction::new().set_layer(rel, i32::MAX));
    stage.screenshot().expect_pixel(0, 0, GREEN);
}

#[test]
fn negative_z_needs_an_inclusive_range() {
    let mut stage = Stage::new();
    let front = stage.color_layer("front", 32, 32, RED);
    let back = stage.color_layer("back", DISPLAY, DISPLAY, BLUE);
    stage.apply(Transaction::new().set_layer(front, -1).set_layer(back, -2));

    let ctx = stage.display_context();
    let shot = stage.capture(&ctx.with_z_range(-2, -1));
    shot.expect_fg(0, 0);
    shot.expect_bg(40, 40);

    let shot = stage.capture(&ctx.with_z_range(-1, -1));
    shot.expect_fg(0, 0);
    shot.expect_pixel(40, 40, BLACK);

    let shot = stage.capture(&ctx.with_z_range(-3, -3));
    shot.expect_pixel(0, 0, BLACK);

    // The display shows everything, so bg covers both.
    stage.screenshot().expect_bg(0, 0);
}

#[test]
fn deferred_transactions_release_per_frame() {
    let mut stage = Stage::new();
    let (bg, fg) = (stage.bg, stage.fg);
    let barrier = stage.compositor.buffer_queue(bg).unwrap();
    let next = barrier.next_frame_number();

    stage.apply(
        Transaction::new()
            .set_alpha(fg, 0.75)
            .defer_until(fg, bg, next),
    );
    stage.apply(
        Transaction::new()
            .set_position(fg, 128.0, 128.0)
            .defer_until(fg, bg, next + 1),
    );
    assert_eq!(stage.compositor.pending_deferred().len(), 2);
    assert_eq!(
        stage.compositor.geometry_phase(fg).unwrap(),
        GeometryPhase::PendingDeferredUntil(DeferUntil {
            barrier: bg,
            frame: next
        })
    );
    stage.screenshot().expect_fg(64, 64);

    stage.present(bg, DISPLAY, DISPLAY, BLUE);
    assert_eq!(stage.compositor.pending_deferred().len(), 1);
    let shot = stage.screenshot();
    shot.expect_pixel(64, 64, Rgba8::rgb(162, 63, 96));
    shot.expect_bg(128, 128);

    stage.present(bg, DISPLAY, DISPLAY, BLUE);
    assert!(stage.compositor.pending_deferred().is_empty());
    let shot = stage.screenshot();
    shot.expect_bg(64, 64);
    shot.expect_pixel(128, 128, Rgba8::rgb(162, 63, 96));
}

#[test]
fn merged_transactions_apply_as_one() {
    let mut stage = Stage::new();
    let fg = stage.fg;
    let first = Transaction::new()
        .set_position(fg, 128.0, 128.0)
        .set_alpha(fg, 0.75);
    let second = Transaction::new().set_position(fg, 0.0, 0.0);
    stage.apply(first.merge(second));

    let shot = stage.screenshot();
    shot.expect_pixel(0, 0, Rgba8::rgb(162, 63, 96));
    shot.expect_bg(128, 128);
}

#[test]
fn color_layers_fill_and_blend() {
    let mut stage = Stage::new();
    let color = stage.color_layer("color", 32, 32, GREEN);
    stage.apply(Transaction::new().set_layer(color, i32::MAX));
    let shot = stage.screenshot();
    shot.expect_region(0, 0, 32, 32, GREEN);
    shot.expect_bg(32, 32);

    stage.apply(Transaction::new().set_alpha(color, 0.75));
    stage
        .screenshot()
        .expect_region(0, 0, 32, 32, Rgba8::rgb(48, 171, 147));

    // Color layers resize at once.
    stage.apply(Transaction::new().set_size(color, 64, 64));
    stage.screenshot().expect_pixel(63, 63, Rgba8::rgb(48, 171, 147));
}

#[test]
fn bufferless_layers_resize_immediately() {
    let stage = Stage::new();
    let empty = stage.buffer_layer("empty", 16, 16);
    stage.apply(Transaction::new().set_size(empty, 32, 32));
    assert_eq!(
        stage.compositor.geometry_phase(empty).unwrap(),
        GeometryPhase::Committed
    );
    assert_eq!(stage.compositor.geometry(empty).unwrap().size.width, 32);
}

#[test]
fn scale_to_window_stretches_any_buffer() {
    let mut stage = Stage::new();
    let fg = stage.fg;
    stage.apply(
        Transaction::new()
            .set_override_scaling_mode(fg, Some(ScalingMode::ScaleToWindow))
            .set_size(fg, 128, 128),
    );
    // The 64x64 buffer stretches to the new size without waiting.
    assert_eq!(
        stage.compositor.geometry_phase(fg).unwrap(),
        GeometryPhase::Committed
    );
    let shot = stage.screenshot();
    shot.expect_region(64, 64, 192, 192, RED);

    let composition = stage.present(fg, 32, 32, GREEN);
    assert_eq!(composition.latched, 1);
    stage.screenshot().expect_region(64, 64, 192, 192, GREEN);
    let shown = stage.compositor.with_scene(|s| s.layers().buffer(fg).unwrap());
    assert_eq!(shown.map(|b| b.size.width), Some(32));
}
