//! The mux engine: many LED lanes sharing one parallel peripheral and one DMA buffer.
//!
//! The pieces, leaf first:
//!
//! - [`BusSize`] and [`Speed`] classes fix the cell layout and bit waveforms at compile time.
//! - [`BitEncoder`] expands protocol bytes into one lane's bits of the payload.
//! - [`LaneRegistry`] hands out lanes and tracks which ones have filled the current cycle.
//! - [`DmaArena`] is the shared region: descriptor chain plus payload.
//! - [`MuxContext`] ties registry, arena and [`LcdPeripheral`](crate::peripheral::LcdPeripheral)
//!   together behind one lock and starts the transfer once every lane has filled.
//! - [`MuxBus`] is one lane's handle on the context.
//!
//! Use the [`lcd_mux!`](crate::lcd_mux!) macro to get a `&'static` context in firmware, and
//! [`MuxStrip`](crate::led_strip::MuxStrip) to drive a strip on it.

mod arena;
mod bus;
mod bus_size;
mod context;
mod encoder;
mod registry;
mod speed;

pub use arena::{
    ArenaLayout, DESCRIPTOR_SIZE, DescriptorOwner, DmaArena, DmaDescriptor, MAX_SEGMENT_LEN,
    PAYLOAD_ALIGN,
};
pub use bus::{FillCursor, MuxBus};
pub use bus_size::{BusSize, CELLS_PER_BIT, Mux8Bit, Mux8BitSwapped, Mux16Bit};
pub use context::MuxContext;
pub use encoder::BitEncoder;
pub use registry::{LaneId, LaneMask, LaneRegistry, MAX_LANES};
pub use speed::{Sk6812, Speed, Ws2811, Ws2812x};

/// Declares a static [`MuxContext`] singleton for one bus.
///
/// Generates a unit struct with an `init` function that moves the peripheral into a
/// [`StaticCell`](static_cell::StaticCell) and returns the `&'static` context. Calling `init`
/// a second time returns [`Error::ContextAlreadyInitialized`](crate::Error::ContextAlreadyInitialized).
///
/// **Required fields:**
///
/// - `peripheral` - Type implementing [`LcdPeripheral`](crate::peripheral::LcdPeripheral)
///
/// **Optional fields:**
///
/// - `bus_size` - [`BusSize`] class (default: [`Mux8Bit`])
///
/// # Example
///
/// ```
/// # use lcd_mux::lcd_mux::{DmaArena, LaneId, Mux16Bit};
/// # use lcd_mux::peripheral::LcdPeripheral;
/// # struct BoardLcd;
/// # impl LcdPeripheral for BoardLcd {
/// #     fn allocate_dma(&mut self, _size: usize) -> Option<&'static mut [u8]> { None }
/// #     fn set_cell_clock(&mut self, _hz: u32) {}
/// #     fn free_dma(&mut self, _region: &'static mut [u8]) {}
/// #     fn connect_lane(&mut self, _pin: u8, _lane: LaneId) {}
/// #     fn disconnect_lane(&mut self, _pin: u8) {}
/// #     fn start_transfer(&mut self, _arena: &DmaArena) {}
/// #     fn is_transfer_done(&self) -> bool { true }
/// # }
/// lcd_mux::lcd_mux! {
///     WideBus {
///         peripheral: BoardLcd,
///         bus_size: Mux16Bit,
///     }
/// }
///
/// let context = WideBus::init(BoardLcd).unwrap();
/// assert!(!context.is_allocated());
/// assert!(WideBus::init(BoardLcd).is_err());
/// assert_eq!(WideBus::LANES, 16);
/// ```
#[macro_export]
macro_rules! lcd_mux {
    ($($tt:tt)*) => { $crate::__lcd_mux_impl! { $($tt)* } };
}

/// Implementation macro. Not part of the public API; use [`lcd_mux!`] instead.
#[doc(hidden)]
#[macro_export]
macro_rules! __lcd_mux_impl {
    // Entry point - name and fields
    (
        $vis:vis $name:ident {
            $($fields:tt)*
        }
    ) => {
        $crate::__lcd_mux_impl! {
            @__fill_defaults
            vis: $vis,
            name: $name,
            peripheral: _UNSET_,
            bus_size: ($crate::lcd_mux::Mux8Bit),
            fields: [ $($fields)* ]
        }
    };

    // Fill defaults: peripheral
    (@__fill_defaults
        vis: $vis:vis,
        name: $name:ident,
        peripheral: $peripheral:tt,
        bus_size: $bus_size:tt,
        fields: [ peripheral: $new_peripheral:ty $(, $($rest:tt)* )? ]
    ) => {
        $crate::__lcd_mux_impl! {
            @__fill_defaults
            vis: $vis,
            name: $name,
            peripheral: ($new_peripheral),
            bus_size: $bus_size,
            fields: [ $($($rest)*)? ]
        }
    };

    // Fill defaults: bus_size
    (@__fill_defaults
        vis: $vis:vis,
        name: $name:ident,
        peripheral: $peripheral:tt,
        bus_size: $bus_size:tt,
        fields: [ bus_size: $new_bus_size:ty $(, $($rest:tt)* )? ]
    ) => {
        $crate::__lcd_mux_impl! {
            @__fill_defaults
            vis: $vis,
            name: $name,
            peripheral: $peripheral,
            bus_size: ($new_bus_size),
            fields: [ $($($rest)*)? ]
        }
    };

    (@__fill_defaults
        vis: $vis:vis,
        name: $name:ident,
        peripheral: _UNSET_,
        bus_size: $bus_size:tt,
        fields: []
    ) => {
        compile_error!("lcd_mux!: peripheral is required");
    };

    // All fields processed - expand the type
    (@__fill_defaults
        vis: $vis:vis,
        name: $name:ident,
        peripheral: ($peripheral:ty),
        bus_size: ($bus_size:ty),
        fields: []
    ) => {
        #[doc = concat!(
            "Static mux bus context holder generated by [`lcd_mux!`](",
            stringify!($crate), "::lcd_mux!)."
        )]
        $vis struct $name;

        impl $name {
            /// Lanes available on this bus.
            #[allow(dead_code, reason = "not every firmware reads it")]
            pub const LANES: u8 = <$bus_size as $crate::lcd_mux::BusSize>::LANES;

            /// Move `peripheral` into the static context and return it.
            ///
            /// # Errors
            ///
            /// Fails if called more than once.
            #[allow(dead_code, reason = "a declared bus may be unused in some builds")]
            $vis fn init(
                peripheral: $peripheral,
            ) -> $crate::Result<&'static $crate::lcd_mux::MuxContext<$bus_size, $peripheral>> {
                static CONTEXT: $crate::__private::static_cell::StaticCell<
                    $crate::lcd_mux::MuxContext<$bus_size, $peripheral>,
                > = $crate::__private::static_cell::StaticCell::new();
                CONTEXT
                    .try_init($crate::lcd_mux::MuxContext::new(peripheral))
                    .map(|context| &*context)
                    .ok_or($crate::Error::ContextAlreadyInitialized)
            }
        }
    };
}
