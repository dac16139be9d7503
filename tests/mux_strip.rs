#![allow(missing_docs)]
//! Host-level tests for the per-strip driver.

mod common;

use common::RecordingLcd;
use embassy_futures::{block_on, join::join};
use embassy_time::Duration;
use lcd_mux::led_strip::{
    ColorFeature, Frame1d, Grb, Grbw, MuxStrip, NoSettings, NoShader, Rgb, SendData, Sk6812,
    Speed, Ws2811, Ws2812x, colors,
};
use lcd_mux::lcd_mux::{BitEncoder, LaneId, Mux8Bit, Mux16Bit, MuxContext};
use lcd_mux::Error;
use smart_leds::{RGB8, RGBW, White};

type Context = MuxContext<Mux8Bit, RecordingLcd>;
type GrbStrip<'c> = MuxStrip<'c, Grb, Ws2812x, Mux8Bit, RecordingLcd>;

const ENCODER: BitEncoder = BitEncoder::new::<Mux8Bit, Ws2812x>();

const PIXELS: [RGB8; 5] = [
    RGB8::new(1, 2, 3),
    RGB8::new(4, 5, 6),
    RGB8::new(7, 8, 9),
    RGB8::new(10, 11, 12),
    RGB8::new(13, 14, 15),
];

fn lane_bytes(payload: &[u8], lane: LaneId, len: usize) -> Vec<u8> {
    let mut bytes = vec![0; len];
    ENCODER.decode(payload, lane, &mut bytes);
    bytes
}

fn grb(pixels: &[RGB8]) -> Vec<u8> {
    pixels.iter().flat_map(|pixel| [pixel.g, pixel.r, pixel.b]).collect()
}

#[test]
fn data_size_includes_reset_padding() {
    assert_eq!(GrbStrip::data_size(3), 3 * 3 + 30);
    assert_eq!(
        MuxStrip::<Grbw, Sk6812, Mux8Bit, RecordingLcd>::data_size(10),
        10 * 4 + 8
    );
}

#[test]
fn frame_time_covers_data_and_reset() {
    let context = Context::new(RecordingLcd::new());
    let strip = GrbStrip::new(&context, 2, 3).unwrap();

    assert_eq!(strip.frame_time(), Duration::from_micros(39 * 10));
    assert_eq!(strip.frame_data_size(), 39);
}

#[test]
fn update_before_initialize_fails() {
    let context = Context::new(RecordingLcd::new());
    let strip = GrbStrip::new(&context, 2, 3).unwrap();

    let result = block_on(strip.update(&PIXELS, &NoSettings, &NoShader));

    assert_eq!(result, Err(Error::NotInitialized));
    context.with_peripheral(|lcd| assert!(lcd.transfers.is_empty()));
}

#[test]
fn initialize_connects_pin_to_lane() {
    let context = Context::new(RecordingLcd::new());
    let mut strip = GrbStrip::new(&context, 21, 3).unwrap();
    strip.initialize().unwrap();

    assert_eq!(strip.pin(), 21);
    assert_eq!(strip.lane(), LaneId::new(0));
    assert!(strip.is_ready_to_update());
    context.with_peripheral(|lcd| assert_eq!(lcd.connected, vec![(21, LaneId::new(0))]));
}

#[test]
fn longer_input_is_truncated_to_strip_length() {
    let context = Context::new(RecordingLcd::new());
    let mut strip = GrbStrip::new(&context, 2, 3).unwrap();
    strip.initialize().unwrap();

    let started = block_on(strip.update(&PIXELS, &NoSettings, &NoShader)).unwrap();

    assert!(started);
    context.with_peripheral(|lcd| {
        let payload = &lcd.last_transfer().payload;
        assert_eq!(lane_bytes(payload, strip.lane(), 9), grb(&PIXELS[..3]));
        // Exactly three pixels were written; the reset padding is still all zero.
        assert!(payload[9 * 32..].iter().all(|byte| *byte == 0));
    });
}

#[test]
fn shorter_input_wraps_around() {
    let context = Context::new(RecordingLcd::new());
    let mut strip = GrbStrip::new(&context, 2, 3).unwrap();
    strip.initialize().unwrap();

    block_on(strip.update(&PIXELS[..2], &NoSettings, &NoShader)).unwrap();

    context.with_peripheral(|lcd| {
        let payload = &lcd.last_transfer().payload;
        assert_eq!(
            lane_bytes(payload, strip.lane(), 9),
            grb(&[PIXELS[0], PIXELS[1], PIXELS[0]])
        );
    });
}

#[test]
fn empty_input_sends_black() {
    let context = Context::new(RecordingLcd::new());
    let mut strip = GrbStrip::new(&context, 2, 4).unwrap();
    strip.initialize().unwrap();

    block_on(strip.update(&[], &NoSettings, &NoShader)).unwrap();

    context.with_peripheral(|lcd| {
        let payload = &lcd.last_transfer().payload;
        assert_eq!(lane_bytes(payload, strip.lane(), 12), vec![0; 12]);
        // Black still goes out as zero bits, not as an idle line.
        assert!(payload[..12 * 32].iter().any(|byte| *byte != 0));
    });
}

#[test]
fn shader_is_applied_to_every_pixel() {
    let context = Context::new(RecordingLcd::new());
    let mut strip = GrbStrip::new(&context, 2, 3).unwrap();
    strip.initialize().unwrap();
    let halve = |color: RGB8| RGB8::new(color.r / 2, color.g / 2, color.b / 2);

    block_on(strip.update(&[RGB8::new(200, 100, 50)], &NoSettings, &halve)).unwrap();

    context.with_peripheral(|lcd| {
        let payload = &lcd.last_transfer().payload;
        assert_eq!(
            lane_bytes(payload, strip.lane(), 9),
            grb(&[RGB8::new(100, 50, 25); 3])
        );
    });
}

#[test]
fn rgb_and_grbw_features_serialize_in_their_order() {
    let context = Context::new(RecordingLcd::new());
    let mut rgb = MuxStrip::<Rgb, Ws2812x, _, _>::new(&context, 1, 1).unwrap();
    let mut grbw = MuxStrip::<Grbw, Sk6812, _, _>::new(&context, 2, 1).unwrap();
    rgb.initialize().unwrap();
    grbw.initialize().unwrap();

    let white = RGBW {
        r: 1,
        g: 2,
        b: 3,
        a: White(4),
    };
    block_on(rgb.update(&[RGB8::new(1, 2, 3)], &NoSettings, &NoShader)).unwrap();
    block_on(grbw.update(&[white], &NoSettings, &NoShader)).unwrap();

    context.with_peripheral(|lcd| {
        let payload = &lcd.last_transfer().payload;
        assert_eq!(lane_bytes(payload, rgb.lane(), 3), vec![1, 2, 3]);
        assert_eq!(lane_bytes(payload, grbw.lane(), 4), vec![2, 1, 3, 4]);
    });
}

/// A chip with a start marker and a brightness trailer around the pixels.
struct Framed;

struct Brightness(u8);

impl ColorFeature for Framed {
    type Color = RGB8;
    type Settings = Brightness;
    const PIXEL_SIZE: usize = 3;
    const SETTINGS_SIZE: usize = 3;
    const BLACK: RGB8 = RGB8::new(0, 0, 0);

    fn apply_pixel_color(out: &mut SendData, color: RGB8) {
        out.extend_from_slice(&[color.r, color.g, color.b]).unwrap();
    }

    fn apply_front_settings(out: &mut SendData, _settings: &Brightness) {
        out.extend_from_slice(&[0xF0, 0x0F]).unwrap();
    }

    fn apply_back_settings(out: &mut SendData, settings: &Brightness) {
        out.push(settings.0).unwrap();
    }
}

#[test]
fn settings_surround_the_pixels() {
    let context = Context::new(RecordingLcd::new());
    let mut strip = MuxStrip::<Framed, Ws2812x, _, _>::new(&context, 2, 2).unwrap();
    strip.initialize().unwrap();

    block_on(strip.update(&PIXELS, &Brightness(0x42), &NoShader)).unwrap();

    context.with_peripheral(|lcd| {
        let payload = &lcd.last_transfer().payload;
        assert_eq!(
            lane_bytes(payload, strip.lane(), 9),
            vec![0xF0, 0x0F, 1, 2, 3, 4, 5, 6, 0x42]
        );
    });
}

#[test]
fn transfer_waits_for_every_strip() {
    let context = Context::new(RecordingLcd::new());
    let mut first = GrbStrip::new(&context, 2, 2).unwrap();
    let mut second = GrbStrip::new(&context, 3, 2).unwrap();
    first.initialize().unwrap();
    second.initialize().unwrap();

    assert!(!block_on(first.update(&[colors::RED], &NoSettings, &NoShader)).unwrap());
    assert!(!first.is_ready_to_update());
    context.with_peripheral(|lcd| assert!(lcd.transfers.is_empty()));

    assert!(block_on(second.update(&[colors::BLUE], &NoSettings, &NoShader)).unwrap());
    assert!(first.is_ready_to_update());

    context.with_peripheral(|lcd| {
        let payload = &lcd.last_transfer().payload;
        assert_eq!(lane_bytes(payload, first.lane(), 6), grb(&[colors::RED; 2]));
        assert_eq!(lane_bytes(payload, second.lane(), 6), grb(&[colors::BLUE; 2]));
    });
}

#[test]
fn early_strip_waits_for_slow_strip_before_refilling() {
    let context = Context::new(RecordingLcd::new());
    let mut fast = GrbStrip::new(&context, 2, 1).unwrap();
    let mut slow = GrbStrip::new(&context, 3, 1).unwrap();
    fast.initialize().unwrap();
    slow.initialize().unwrap();

    block_on(fast.update(&[colors::RED], &NoSettings, &NoShader)).unwrap();

    // The fast strip's second frame must not be OR-ed into the first cycle.
    let (fast_started, slow_started) = block_on(join(
        fast.update(&[colors::GREEN], &NoSettings, &NoShader),
        async {
            embassy_futures::yield_now().await;
            slow.update(&[colors::BLUE], &NoSettings, &NoShader).await
        },
    ));
    assert!(!fast_started.unwrap());
    assert!(slow_started.unwrap());

    context.with_peripheral(|lcd| {
        assert_eq!(lcd.transfers.len(), 1);
        let payload = &lcd.transfers[0].payload;
        assert_eq!(lane_bytes(payload, fast.lane(), 3), grb(&[colors::RED]));
        assert_eq!(lane_bytes(payload, slow.lane(), 3), grb(&[colors::BLUE]));
    });

    // The next cycle carries the fast strip's second frame once the slow strip catches up.
    block_on(slow.update(&[colors::WHITE], &NoSettings, &NoShader)).unwrap();
    context.with_peripheral(|lcd| {
        assert_eq!(lcd.transfers.len(), 2);
        let payload = &lcd.last_transfer().payload;
        assert_eq!(lane_bytes(payload, fast.lane(), 3), grb(&[colors::GREEN]));
        assert_eq!(lane_bytes(payload, slow.lane(), 3), grb(&[colors::WHITE]));
    });
}

#[test]
fn strip_waits_for_in_flight_transfer() {
    let context = Context::new(RecordingLcd::manual());
    let mut strip = GrbStrip::new(&context, 2, 1).unwrap();
    strip.initialize().unwrap();
    block_on(strip.update(&[colors::RED], &NoSettings, &NoShader)).unwrap();
    assert!(!strip.is_ready_to_update());

    let finisher = async {
        embassy_futures::yield_now().await;
        context.with_peripheral(RecordingLcd::finish_transfer);
    };
    let (started, ()) = block_on(join(
        strip.update(&[colors::GREEN], &NoSettings, &NoShader),
        finisher,
    ));

    assert!(started.unwrap());
    context.with_peripheral(|lcd| {
        assert_eq!(lcd.transfers.len(), 2);
        // Let the strip's drop find the bus idle.
        lcd.finish_transfer();
    });
}

#[test]
fn ninth_strip_on_eight_lane_bus_is_refused() {
    let context = Context::new(RecordingLcd::new());
    let strips: Vec<_> = (0..8)
        .map(|pin| GrbStrip::new(&context, pin, 1).unwrap())
        .collect();

    let refused = GrbStrip::new(&context, 8, 1);

    assert!(matches!(
        refused,
        Err(Error::LanesExhausted { capacity: 8 })
    ));
    drop(strips);
}

#[test]
fn sixteen_lane_bus_accepts_sixteen_strips() {
    let context = MuxContext::<Mux16Bit, RecordingLcd>::new(RecordingLcd::new());
    let mut strips: Vec<_> = (0..16)
        .map(|pin| MuxStrip::<Grb, Ws2812x, _, _>::new(&context, pin, 1).unwrap())
        .collect();
    for strip in &mut strips {
        strip.initialize().unwrap();
    }

    let encoder = BitEncoder::new::<Mux16Bit, Ws2812x>();
    let started = strips
        .iter()
        .map(|strip| {
            let color = RGB8::new(strip.lane().index(), 0, 0xFF);
            block_on(strip.update(&[color], &NoSettings, &NoShader)).unwrap()
        })
        .filter(|started| *started)
        .count();

    assert_eq!(started, 1);
    context.with_peripheral(|lcd| {
        let payload = &lcd.last_transfer().payload;
        for lane in (0..16).map(LaneId::new) {
            let mut bytes = [0; 3];
            encoder.decode(payload, lane, &mut bytes);
            assert_eq!(bytes, [0, lane.index(), 0xFF]);
        }
    });
}

#[test]
fn closing_last_strip_frees_buffer() {
    let context = Context::new(RecordingLcd::new());
    let mut first = GrbStrip::new(&context, 2, 3).unwrap();
    let mut second = GrbStrip::new(&context, 3, 3).unwrap();
    first.initialize().unwrap();
    second.initialize().unwrap();
    let size = context.buffer_size();

    block_on(first.close());
    assert!(context.is_allocated());

    block_on(second.close());
    assert!(!context.is_allocated());
    context.with_peripheral(|lcd| {
        assert_eq!(lcd.freed, vec![size]);
        assert_eq!(lcd.disconnected, vec![2, 3]);
    });
}

#[test]
fn closing_strip_releases_waiting_strip() {
    let context = Context::new(RecordingLcd::new());
    let mut staying = GrbStrip::new(&context, 2, 1).unwrap();
    let mut leaving = GrbStrip::new(&context, 3, 1).unwrap();
    staying.initialize().unwrap();
    leaving.initialize().unwrap();

    block_on(staying.update(&[colors::RED], &NoSettings, &NoShader)).unwrap();
    assert!(!staying.is_ready_to_update());

    block_on(leaving.close());

    assert!(staying.is_ready_to_update());
    context.with_peripheral(|lcd| assert_eq!(lcd.transfers.len(), 1));
}

#[test]
fn strip_taking_over_a_lane_mid_cycle_sends_only_its_own_frame() {
    let context = Context::new(RecordingLcd::new());
    let mut dark = GrbStrip::new(&context, 2, 1).unwrap();
    let mut bright = GrbStrip::new(&context, 3, 1).unwrap();
    let mut slow = GrbStrip::new(&context, 4, 1).unwrap();
    dark.initialize().unwrap();
    bright.initialize().unwrap();
    slow.initialize().unwrap();

    block_on(dark.update(&[colors::BLACK], &NoSettings, &NoShader)).unwrap();
    block_on(bright.update(&[colors::WHITE], &NoSettings, &NoShader)).unwrap();
    let freed_lane = bright.lane();
    block_on(bright.close());

    let mut newcomer = GrbStrip::new(&context, 5, 1).unwrap();
    assert_eq!(newcomer.lane(), freed_lane);
    newcomer.initialize().unwrap();
    block_on(newcomer.update(&[colors::BLACK], &NoSettings, &NoShader)).unwrap();
    assert!(block_on(slow.update(&[colors::RED], &NoSettings, &NoShader)).unwrap());

    context.with_peripheral(|lcd| {
        let payload = &lcd.last_transfer().payload;
        assert_eq!(lane_bytes(payload, newcomer.lane(), 3), vec![0, 0, 0]);
        assert_eq!(lane_bytes(payload, dark.lane(), 3), vec![0, 0, 0]);
        assert_eq!(lane_bytes(payload, slow.lane(), 3), grb(&[colors::RED]));
    });
}

#[test]
fn mixed_cell_clocks_are_refused_on_one_bus() {
    let context = Context::new(RecordingLcd::new());
    let mut slow = MuxStrip::<Rgb, Ws2811, Mux8Bit, RecordingLcd>::new(&context, 2, 4).unwrap();

    let fast = GrbStrip::new(&context, 3, 4);
    assert!(matches!(fast, Err(Error::CellClockMismatch { .. })));

    slow.initialize().unwrap();
    context.with_peripheral(|lcd| assert_eq!(lcd.cell_clock_hz, Some(Ws2811::CELL_CLOCK_HZ)));
    assert_eq!(slow.frame_time(), Duration::from_micros((4 * 3 + 15) * 20));
}

#[test]
fn allocation_failure_surfaces_from_initialize() {
    let context = Context::new(RecordingLcd::with_allocation_limit(16));
    let mut strip = GrbStrip::new(&context, 2, 3).unwrap();

    assert!(matches!(
        strip.initialize(),
        Err(Error::DmaAllocation { .. })
    ));
    let result = block_on(strip.update(&PIXELS, &NoSettings, &NoShader));
    assert_eq!(result, Err(Error::NotInitialized));
}

#[test]
fn frame_pixels_default_to_black_past_the_end() {
    let mut frame = Frame1d::<3>::new();
    frame[1] = colors::RED;

    assert_eq!(frame.pixel(1), colors::RED);
    assert_eq!(frame.pixel(3), RGB8::new(0, 0, 0));
    assert_eq!(Frame1d::<2, Grbw>::filled(Grbw::BLACK).pixel(5), Grbw::BLACK);
}

lcd_mux::lcd_mux! {
    TestBus {
        peripheral: RecordingLcd,
    }
}

#[test]
fn singleton_initializes_once() {
    let context = TestBus::init(RecordingLcd::new()).unwrap();
    assert_eq!(TestBus::LANES, 8);

    let mut strip = GrbStrip::new(context, 2, 1).unwrap();
    strip.initialize().unwrap();
    assert!(block_on(strip.update(&[colors::RED], &NoSettings, &NoShader)).unwrap());

    assert!(matches!(
        TestBus::init(RecordingLcd::new()),
        Err(Error::ContextAlreadyInitialized)
    ));
}
