//! AXS15231B QSPI panel: bus bring-up, backlight and canvas flush.

use anyhow::Result;
use core::ffi::c_void;
use log::{info, warn};

use skyframe::canvas::{Canvas, PANEL_HEIGHT, PANEL_WIDTH};
use skyframe::render::Panel;

use crate::esp_check;

/// Number of panel rows sent per DMA chunk.
pub const CHUNK_LINES: i32 = 20;

const PCLK_HZ: u32 = 40_000_000;

const PIN_LCD_SCLK: i32 = 5;
const PIN_LCD_D0: i32 = 1;
const PIN_LCD_D1: i32 = 2;
const PIN_LCD_D2: i32 = 3;
const PIN_LCD_D3: i32 = 4;
const PIN_LCD_CS: i32 = 12;
const PIN_LCD_BL: i32 = 6;

const LCD_OPCODE_WRITE_CMD: u32 = 0x02;
const LCD_CMD_RASET: u32 = 0x2B;

// FFI structs matching the C AXS15231B driver.

#[repr(C)]
struct Axs15231bLcdInitCmd {
    cmd: i32,
    data: *const c_void,
    data_bytes: usize,
    delay_ms: u32,
}

#[repr(C)]
struct Axs15231bVendorFlags {
    use_qspi_interface: u32,
}

#[repr(C)]
struct Axs15231bVendorConfig {
    init_cmds: *const Axs15231bLcdInitCmd,
    init_cmds_size: u16,
    flags: Axs15231bVendorFlags,
}

extern "C" {
    fn esp_lcd_new_panel_axs15231b(
        io: esp_idf_sys::esp_lcd_panel_io_handle_t,
        panel_dev_config: *const esp_idf_sys::esp_lcd_panel_dev_config_t,
        ret_panel: *mut esp_idf_sys::esp_lcd_panel_handle_t,
    ) -> esp_idf_sys::esp_err_t;
}

fn qspi_cmd(raw: u32) -> i32 {
    ((LCD_OPCODE_WRITE_CMD << 24) | ((raw & 0xFF) << 8)) as i32
}

/// Panel handles plus the persistent DMA staging buffer.
pub struct LcdPanel {
    io: esp_idf_sys::esp_lcd_panel_io_handle_t,
    panel: esp_idf_sys::esp_lcd_panel_handle_t,
    dma_buf: *mut u8,
    dma_bytes: usize,
    flush_errors: u32,
    _vendor_config: Box<Axs15231bVendorConfig>,
}

impl LcdPanel {
    /// Bring up SPI2 in quad mode and the panel with the driver's default
    /// init sequence. Display memory is undefined until the first flush;
    /// the backlight stays off.
    pub fn init() -> Result<Self> {
        let mut bus_cfg = esp_idf_sys::spi_bus_config_t::default();
        bus_cfg.__bindgen_anon_1.mosi_io_num = PIN_LCD_D0;
        bus_cfg.__bindgen_anon_2.miso_io_num = PIN_LCD_D1;
        bus_cfg.__bindgen_anon_3.quadwp_io_num = PIN_LCD_D2;
        bus_cfg.__bindgen_anon_4.quadhd_io_num = PIN_LCD_D3;
        bus_cfg.sclk_io_num = PIN_LCD_SCLK;
        bus_cfg.max_transfer_sz = PANEL_WIDTH as i32 * CHUNK_LINES * 2;

        let host = esp_idf_sys::spi_host_device_t_SPI2_HOST;
        esp_check(
            unsafe {
                esp_idf_sys::spi_bus_initialize(
                    host,
                    &bus_cfg,
                    esp_idf_sys::spi_common_dma_t_SPI_DMA_CH_AUTO,
                )
            },
            "spi_bus_initialize",
        )?;

        let mut io: esp_idf_sys::esp_lcd_panel_io_handle_t = core::ptr::null_mut();
        let io_cfg = esp_idf_sys::esp_lcd_panel_io_spi_config_t {
            cs_gpio_num: PIN_LCD_CS,
            dc_gpio_num: -1,
            spi_mode: 3,
            pclk_hz: PCLK_HZ,
            trans_queue_depth: 10,
            on_color_trans_done: None,
            user_ctx: core::ptr::null_mut(),
            lcd_cmd_bits: 32,
            lcd_param_bits: 8,
            flags: esp_idf_sys::esp_lcd_panel_io_spi_config_t__bindgen_ty_1 {
                _bitfield_align_1: [],
                _bitfield_1:
                    esp_idf_sys::esp_lcd_panel_io_spi_config_t__bindgen_ty_1::new_bitfield_1(
                        0, 0, 0, 0, 1, 0, 0, 0,
                    ),
                __bindgen_padding_0: [0; 3],
            },
        };
        esp_check(
            unsafe {
                esp_idf_sys::esp_lcd_new_panel_io_spi(
                    host as esp_idf_sys::esp_lcd_spi_bus_handle_t,
                    &io_cfg,
                    &mut io,
                )
            },
            "esp_lcd_new_panel_io_spi",
        )?;

        // A null command table selects the driver's built-in init sequence.
        let vendor_config = Box::new(Axs15231bVendorConfig {
            init_cmds: core::ptr::null(),
            init_cmds_size: 0,
            flags: Axs15231bVendorFlags { use_qspi_interface: 1 },
        });
        let panel_cfg = esp_idf_sys::esp_lcd_panel_dev_config_t {
            reset_gpio_num: -1,
            __bindgen_anon_1: esp_idf_sys::esp_lcd_panel_dev_config_t__bindgen_ty_1 {
                rgb_ele_order: esp_idf_sys::lcd_rgb_element_order_t_LCD_RGB_ELEMENT_ORDER_RGB,
            },
            data_endian: esp_idf_sys::lcd_rgb_data_endian_t_LCD_RGB_DATA_ENDIAN_BIG,
            bits_per_pixel: 16,
            flags: esp_idf_sys::esp_lcd_panel_dev_config_t__bindgen_ty_2 {
                _bitfield_align_1: [],
                _bitfield_1: esp_idf_sys::esp_lcd_panel_dev_config_t__bindgen_ty_2::new_bitfield_1(0),
                __bindgen_padding_0: [0; 3],
            },
            vendor_config: (&*vendor_config) as *const Axs15231bVendorConfig as *mut c_void,
        };

        let mut panel: esp_idf_sys::esp_lcd_panel_handle_t = core::ptr::null_mut();
        esp_check(
            unsafe { esp_lcd_new_panel_axs15231b(io, &panel_cfg, &mut panel) },
            "esp_lcd_new_panel_axs15231b",
        )?;
        esp_check(unsafe { esp_idf_sys::esp_lcd_panel_reset(panel) }, "panel_reset")?;
        esp_check(unsafe { esp_idf_sys::esp_lcd_panel_init(panel) }, "panel_init")?;
        esp_check(unsafe { esp_idf_sys::esp_lcd_panel_disp_on_off(panel, false) }, "disp_on")?;

        let dma_bytes = PANEL_WIDTH as usize * CHUNK_LINES as usize * 2;
        let dma_buf = unsafe {
            esp_idf_sys::heap_caps_malloc(
                dma_bytes,
                esp_idf_sys::MALLOC_CAP_DMA
                    | esp_idf_sys::MALLOC_CAP_INTERNAL
                    | esp_idf_sys::MALLOC_CAP_8BIT,
            ) as *mut u8
        };
        if dma_buf.is_null() {
            anyhow::bail!("DMA buffer alloc failed ({} bytes)", dma_bytes);
        }

        init_backlight_pin()?;
        info!("Display initialized OK");
        Ok(Self {
            io,
            panel,
            dma_buf,
            dma_bytes,
            flush_errors: 0,
            _vendor_config: vendor_config,
        })
    }

    fn send_raset(&self, y_start: i32, y_end: i32) -> esp_idf_sys::esp_err_t {
        let y_end_incl = y_end - 1;
        let params: [u8; 4] = [
            ((y_start >> 8) & 0xFF) as u8,
            (y_start & 0xFF) as u8,
            ((y_end_incl >> 8) & 0xFF) as u8,
            (y_end_incl & 0xFF) as u8,
        ];
        unsafe {
            esp_idf_sys::esp_lcd_panel_io_tx_param(
                self.io,
                qspi_cmd(LCD_CMD_RASET),
                params.as_ptr().cast(),
                params.len(),
            )
        }
    }
}

fn init_backlight_pin() -> Result<()> {
    let io_conf = esp_idf_sys::gpio_config_t {
        pin_bit_mask: 1u64 << (PIN_LCD_BL as u64),
        mode: esp_idf_sys::gpio_mode_t_GPIO_MODE_OUTPUT,
        pull_up_en: esp_idf_sys::gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: esp_idf_sys::gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: esp_idf_sys::gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    esp_check(unsafe { esp_idf_sys::gpio_config(&io_conf) }, "backlight gpio_config")?;
    esp_check(unsafe { esp_idf_sys::gpio_set_level(PIN_LCD_BL, 0) }, "backlight off")
}

impl Panel for LcdPanel {
    /// Stream the canvas top to bottom. Its memory is already in native
    /// portrait order, so each chunk is a straight byte swap.
    fn flush(&mut self, canvas: &Canvas) {
        let dma = unsafe { core::slice::from_raw_parts_mut(self.dma_buf, self.dma_bytes) };
        let src = canvas.raw();
        let pw = PANEL_WIDTH as usize;
        let ph = PANEL_HEIGHT as i32;

        let mut py = 0i32;
        while py < ph {
            let py_end = (py + CHUNK_LINES).min(ph);
            let rows = &src[py as usize * pw..py_end as usize * pw];
            for (dst, px) in dma.chunks_exact_mut(2).zip(rows) {
                dst.copy_from_slice(&px.to_be_bytes());
            }

            let mut rc = self.send_raset(py, py_end);
            if rc == esp_idf_sys::ESP_OK {
                rc = unsafe {
                    esp_idf_sys::esp_lcd_panel_draw_bitmap(
                        self.panel,
                        0,
                        py,
                        pw as i32,
                        py_end,
                        dma.as_ptr().cast(),
                    )
                };
            }
            if rc != esp_idf_sys::ESP_OK {
                self.flush_errors = self.flush_errors.saturating_add(1);
                warn!("LCD flush failed at row {} (err {}, {} total)", py, rc, self.flush_errors);
                return;
            }
            py = py_end;
        }
    }

    fn set_backlight(&mut self, on: bool) {
        let rc = unsafe { esp_idf_sys::gpio_set_level(PIN_LCD_BL, u32::from(on)) };
        if rc == esp_idf_sys::ESP_OK {
            info!("Backlight {}", if on { "ON" } else { "OFF" });
        } else {
            warn!("Backlight switch failed (err {})", rc);
        }
    }
}

impl Drop for LcdPanel {
    fn drop(&mut self) {
        unsafe { esp_idf_sys::heap_caps_free(self.dma_buf.cast()) };
    }
}
