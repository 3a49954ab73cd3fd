//! Host facade ([`SdioHost`]) and the SDHC host engine implementing it
//! over the register model (spec sections 4.2-4.3).

use alloc::boxed::Box;
use core::ptr::NonNull;
use core::time::Duration;

use log::{debug, error, trace, warn};

use crate::arch::dsb;
use crate::platform::Platform;

use super::cmd::{Command, CommandCallback, DataDescriptor, ResponseType};
use super::constants::*;
use super::err::{SdhcError, SdhcResult};
use super::queue::CommandQueue;
use super::regs::*;

/// Command index for `STOP_TRANSMISSION`; the only command whose R1b
/// response is read from word 3 instead of word 0 (spec section 4.3,
/// "On command-complete").
const CMD_STOP_TRANSMISSION: u32 = 12;

/// Variant-agnostic host interface the MMC protocol layer depends on
/// (spec section 4.2): a trait object so the protocol layer never needs
/// to know which controller generation it's driving.
pub trait SdioHost {
    fn reset(&mut self) -> SdhcResult;
    fn set_operational(&mut self) -> SdhcResult;
    /// Submit `cmd`. Blocks and returns the completion value if `cb` is
    /// `None`; otherwise returns `0` immediately and `cb` fires from the
    /// interrupt dispatcher once the command settles.
    ///
    /// `cmd` must stay at a fixed address until it completes: the caller
    /// keeps it on the stack for the blocking case, or boxed on the heap
    /// (kept alive until the callback runs) for the async case.
    fn send_command(&mut self, cmd: &mut Command, cb: Option<CommandCallback>, token: usize)
        -> i32;
    fn handle_irq(&mut self, irq: u32);
    fn is_voltage_compatible(&self, mv: u32) -> bool;
    fn nth_irq(&self, n: usize) -> Option<u32>;
    fn present_state(&self) -> u32;
    /// The voltage mask to offer during ACMD41 negotiation, delegated to
    /// the platform (spec section 4.2). Exposed on the facade, not a
    /// separate `Platform` parameter, so the MMC layer depends only on
    /// the facade (spec section 4.2, "The MMC layer depends only on the
    /// facade").
    fn default_voltage_mask(&self, ocr: u32) -> u32;
    /// Busy-wait for at least `us` microseconds, delegated to the platform.
    fn udelay(&self, us: u32);
    /// Whether this board has no working card-detect pin, delegated to
    /// the platform (spec section 4.5, "get_state").
    fn non_removable(&self) -> bool;
}

/// Concrete SDHC host engine (spec section 2, C4). Owns the MMIO register
/// block, the board's [`Platform`], and the command queue.
pub struct Sdhc {
    reg: SdhcReg,
    platform: Box<dyn Platform>,
    queue: CommandQueue,
    /// PIO blocks left to drain/fill on the current data transfer.
    blocks_remaining: u32,
    /// Whether `MIX_CTRL` is a standalone register (v3+) or folded into
    /// `CMD_XFR_TYP` (v2).
    v3_or_later: bool,
    ddr_mode: bool,
}

impl Sdhc {
    pub fn new(platform: Box<dyn Platform>, base: NonNull<u8>) -> Self {
        let reg = SdhcReg::new(base);
        let v3_or_later = reg.read_reg::<HostVersion>().is_v3_or_later();
        Self {
            reg,
            platform,
            queue: CommandQueue::new(),
            blocks_remaining: 0,
            v3_or_later,
            ddr_mode: false,
        }
    }

    pub fn platform(&self) -> &dyn Platform {
        self.platform.as_ref()
    }

    fn enable_mask_for(&self, data: Option<&DataDescriptor>) {
        let pio = data.is_none_or(|d| d.pbuf == 0);

        let mut status_en = IntStatusEn::CC
            | IntStatusEn::TC
            | IntStatusEn::CINS
            | IntStatusEn::CREM
            | IntStatusEn::ALL_ERR;
        let mut signal_en = IntSignalEn::CC
            | IntSignalEn::TC
            | IntSignalEn::CINS
            | IntSignalEn::CREM
            | IntSignalEn::ALL_ERR;
        if pio {
            status_en |= IntStatusEn::BRR | IntStatusEn::BWR;
            signal_en |= IntSignalEn::BRR | IntSignalEn::BWR;
        }

        self.reg.write_reg(status_en);
        self.reg.write_reg(signal_en);
    }

    /// Program hardware for the current queue head (spec section 4.3,
    /// "next_cmd"). Programming the transfer-type register at the end is
    /// the trigger that starts the command.
    fn next_cmd(&mut self) {
        let (index, arg, response_type, data) = {
            let Some(head) = self.queue.head() else {
                return;
            };
            (head.index, head.arg, head.response_type, head.data)
        };

        self.enable_mask_for(data.as_ref());

        if self
            .reg
            .wait_for::<PresState, _>(
                |s| !s.intersects(PresState::CIHB | PresState::CDIHB | PresState::DLA),
                Duration::from_micros(1),
                Some(RETRIES_TIMEOUT),
            )
            .is_err()
        {
            warn!("sdhc: command/data line never went idle for cmd{index}");
            if let Some(head) = self.queue.head_mut() {
                head.complete = -1;
            }
            self.complete_head();
            return;
        }

        self.reg.write_reg(CmdArg::from_bits_truncate(arg));

        let mut xfr = CmdXfrTyp::with_index(index);
        let (rsptyp, cicen, cccen) = response_type.xfr_bits();
        xfr |= CmdXfrTyp::from_bits_truncate(rsptyp << 16);
        if cicen {
            xfr |= CmdXfrTyp::CICEN;
        }
        if cccen {
            xfr |= CmdXfrTyp::CCCEN;
        }

        match data {
            Some(data) => {
                xfr |= CmdXfrTyp::DPSEL;
                self.blocks_remaining = data.block_count;

                self.reg.clear_reg(SysCtrl::DTOCV_MASK);
                self.reg.set_reg(SysCtrl::dtocv(DATA_TIMEOUT_DTOCV));

                self.reg
                    .write_reg(BlkAtt::new(data.block_size, data.block_count));

                let wml = (data.block_size / 4).min(WATERMARK_MAX);
                self.reg.write_reg(if data.is_read {
                    WtmkLvl::read(wml)
                } else {
                    WtmkLvl::write(wml)
                });

                let mut mix = MixCtrl::BCEN;
                if data.block_count > 1 {
                    mix |= MixCtrl::MSBSEL;
                }
                if data.is_read {
                    mix |= MixCtrl::DTDSEL;
                }
                #[cfg(feature = "dma")]
                if data.pbuf != 0 {
                    mix |= MixCtrl::DMAEN;
                }

                if self.v3_or_later {
                    self.reg.write_reg(mix);
                } else {
                    xfr |= CmdXfrTyp::from_bits_truncate(mix.bits());
                }

                // SDMA (simple DMA, enabled via MixCtrl::DMAEN above) reads
                // its transfer address out of DS_ADDR, not ADMA_SYS_ADDR —
                // the latter only applies to the ADMA2 descriptor-chain
                // path, which this crate doesn't drive (spec section 4.3,
                // "program DS_ADDR = pbuf").
                #[cfg(feature = "dma")]
                if data.pbuf != 0 {
                    self.reg
                        .write_reg(DsAddr::from_bits_truncate(data.pbuf as u32));
                }
            }
            None => self.blocks_remaining = 0,
        }

        // Drain the write buffer so every setup register above is visible
        // to the controller before the trigger write below starts it
        // (spec section 9, "explicit memory-barrier primitives").
        unsafe { dsb() };
        self.reg.write_reg(xfr);
    }

    /// Detach the completed head, program the new head if any, then fire
    /// the detached command's callback (spec section 4.3, "After flag
    /// evaluation").
    fn complete_head(&mut self) {
        let Some(mut done) = self.queue.advance() else {
            return;
        };
        if !self.queue.is_empty() {
            self.next_cmd();
        }
        // SAFETY: `done` was just detached; the queue no longer
        // references it and nothing else holds a pointer to it.
        let done = unsafe { done.as_mut() };
        if let Some(cb) = done.callback {
            cb(done.complete, done.token);
        }
    }

    fn copy_response(&mut self) {
        let r0 = self.reg.read_reg::<CmdRsp0>().bits();
        let r1 = self.reg.read_reg::<CmdRsp1>().bits();
        let r2 = self.reg.read_reg::<CmdRsp2>().bits();
        let r3 = self.reg.read_reg::<CmdRsp3>().bits();

        let Some(head) = self.queue.head_mut() else {
            return;
        };
        match head.response_type {
            ResponseType::None => {}
            ResponseType::R2 => head.response = [r0, r1, r2, r3],
            ResponseType::R1b => {
                head.response[0] = if head.index == CMD_STOP_TRANSMISSION {
                    r3
                } else {
                    r0
                };
            }
            _ => head.response[0] = r0,
        }
    }

    /// Drain or fill exactly one `block_size` through the PIO data port,
    /// 32 bits at a time (spec section 4.3, "On BRR/BWR").
    fn pio_step(&mut self) {
        let Some(head) = self.queue.head_mut() else {
            return;
        };
        let Some(data) = head.data.as_mut() else {
            return;
        };

        let words = data.block_size / 4;
        let is_read = data.is_read;
        let mut ptr = data.vbuf.cast::<u32>();

        if !is_read {
            // Buffer contents must be visible before the FIFO writes below
            // start draining them (spec section 9, "explicit memory-barrier
            // primitives").
            unsafe { dsb() };
        }

        for _ in 0..words {
            if is_read {
                let word = self.reg.read_reg::<DataPort>().bits();
                // SAFETY: `vbuf` points at a caller-owned buffer at least
                // `block_size` bytes long.
                unsafe { ptr.as_ptr().write_volatile(word) };
            } else {
                let word = unsafe { ptr.as_ptr().read_volatile() };
                self.reg.write_reg(DataPort::from_bits_truncate(word));
            }
            ptr = unsafe { NonNull::new_unchecked(ptr.as_ptr().add(1)) };
        }

        data.vbuf = ptr.cast::<u8>();
        self.blocks_remaining -= 1;
    }

    /// Ensure the internal clock is enabled and stable, then reprogram
    /// the SDCLK divider (spec section 4.3, "Clock programming"). The
    /// total divide is the product of `dvs` (the 4-bit divisor-minus-one
    /// `DVS` field) and `prescaler` (the 8-bit one-hot `SDCLKFS` field);
    /// neither field alone can express the identification-mode /512 or
    /// operational-mode /8 divides, so both must be programmed.
    fn program_clock(&self, dvs: u32, prescaler: u32) -> SdhcResult {
        self.reg.set_reg(SysCtrl::ICE);
        self.reg.retry_for::<SysCtrl, _>(
            |s| s.contains(SysCtrl::ICS),
            Some(RETRIES_TIMEOUT),
        )?;

        if !self.reg.read_reg::<PresState>().contains(PresState::SDSTB) {
            error!("sdhc: clock not stable, refusing to reprogram divider");
            return Err(SdhcError::ClockError);
        }

        self.reg.clear_reg(SysCtrl::CEN);

        // DDR mode doubles the effective divider, so only the prescaler
        // half is halved (spec section 4.3, "Clock programming").
        let fs = if self.ddr_mode { prescaler >> 1 } else { prescaler };
        self.reg.clear_reg(SysCtrl::SDCLKFS_MASK | SysCtrl::DVS_MASK);
        self.reg.set_reg(SysCtrl::sdclkfs(fs));
        self.reg.set_reg(SysCtrl::dvs(dvs));
        self.reg.clear_reg(SysCtrl::DTOCV_MASK);
        self.reg.set_reg(SysCtrl::dtocv(DATA_TIMEOUT_DTOCV));

        self.reg.set_reg(SysCtrl::CEN);
        Ok(())
    }
}

impl SdioHost for Sdhc {
    fn reset(&mut self) -> SdhcResult {
        self.reg.set_reg(SysCtrl::RSTA);
        self.reg
            .retry_for::<SysCtrl, _>(|s| !s.contains(SysCtrl::RSTA), Some(RETRIES_TIMEOUT))?;

        self.reg.write_reg(
            IntStatusEn::CC
                | IntStatusEn::TC
                | IntStatusEn::BRR
                | IntStatusEn::BWR
                | IntStatusEn::CINS
                | IntStatusEn::CREM
                | IntStatusEn::ALL_ERR,
        );
        self.reg.write_reg(
            IntSignalEn::CC
                | IntSignalEn::TC
                | IntSignalEn::BRR
                | IntSignalEn::BWR
                | IntSignalEn::CINS
                | IntSignalEn::CREM
                | IntSignalEn::ALL_ERR,
        );

        self.ddr_mode = false;
        self.program_clock(SDCLK_DVS_IDENTIFY, SDCLK_PRESCALER_IDENTIFY)?;

        self.reg.clear_reg(ProtCtrl::DTW_MASK);
        self.reg.set_reg(ProtCtrl::DTW_4BIT);

        self.reg.retry_for::<PresState, _>(
            |s| !s.intersects(PresState::CIHB | PresState::CDIHB),
            Some(RETRIES_TIMEOUT),
        )?;

        self.reg.set_reg(SysCtrl::INITA);
        self.reg
            .retry_for::<SysCtrl, _>(|s| !s.contains(SysCtrl::INITA), Some(RETRIES_TIMEOUT))?;

        let state = self.reg.read_reg::<PresState>();
        debug!(
            "sdhc: reset done, card {}present, write-protect {}",
            if state.contains(PresState::CINST) {
                ""
            } else {
                "not "
            },
            if state.contains(PresState::WPSPL) {
                "open"
            } else {
                "engaged"
            },
        );

        self.queue = CommandQueue::new();
        self.blocks_remaining = 0;

        Ok(())
    }

    fn set_operational(&mut self) -> SdhcResult {
        self.program_clock(SDCLK_DVS_OPERATIONAL, SDCLK_PRESCALER_OPERATIONAL)
    }

    fn send_command(
        &mut self,
        cmd: &mut Command,
        cb: Option<CommandCallback>,
        token: usize,
    ) -> i32 {
        cmd.complete = 0;
        cmd.next = None;
        cmd.callback = cb;
        cmd.token = token;

        // SAFETY: `cmd` is kept at a fixed address by the caller until it
        // completes, per this trait method's contract.
        let is_head = unsafe { self.queue.push(cmd) };
        if is_head {
            self.next_cmd();
        }

        if cb.is_some() {
            return 0;
        }

        #[cfg(feature = "poll")]
        while cmd.complete == 0 {
            self.handle_irq(0);
        }
        #[cfg(feature = "irq")]
        while cmd.complete == 0 {
            core::hint::spin_loop();
        }

        cmd.complete
    }

    fn handle_irq(&mut self, _irq: u32) {
        let status = self.reg.read_reg::<IntStatus>();

        if self.queue.is_empty() {
            self.reg.write_reg(status);
            return;
        }

        if status.contains(IntStatus::TNE) {
            warn!("sdhc: tuning error");
        }
        if status.contains(IntStatus::OVRCUR) {
            warn!("sdhc: overcurrent");
        }
        if status.contains(IntStatus::TP) {
            trace!("sdhc: tuning pass");
        }
        if status.contains(IntStatus::RTE) {
            trace!("sdhc: retuning event");
        }
        if status.contains(IntStatus::CINT) {
            trace!("sdhc: card interrupt");
        }
        if status.contains(IntStatus::CINS) {
            trace!("sdhc: card inserted");
        }
        if status.contains(IntStatus::DINT) {
            trace!("sdhc: dma interrupt");
        }
        if status.contains(IntStatus::BGE) {
            trace!("sdhc: block gap event");
        }

        let fatal = status.intersects(IntStatus::ALL_ERR) || status.contains(IntStatus::CREM);
        let mut done = false;

        if fatal {
            error!(
                "sdhc: command failed, int_status=0x{:08x}",
                status.bits()
            );
            if let Some(head) = self.queue.head_mut() {
                head.complete = -1;
            }
            done = true;
        } else {
            if status.contains(IntStatus::CC) {
                self.copy_response();
                if let Some(head) = self.queue.head_mut() {
                    if head.data.is_none() {
                        head.complete = 1;
                        done = true;
                    }
                }
            }

            if status.intersects(IntStatus::BRR | IntStatus::BWR) && self.blocks_remaining > 0 {
                self.pio_step();
            }

            if status.contains(IntStatus::TC) {
                if let Some(head) = self.queue.head_mut() {
                    debug_assert_eq!(head.complete, 0, "TC fired on an already-completed command");
                    head.complete = 1;
                    done = true;
                }
            }
        }

        self.reg.write_reg(status);

        if done {
            self.complete_head();
        }
    }

    fn is_voltage_compatible(&self, mv: u32) -> bool {
        self.reg.read_reg::<HostCtrlCap>().contains(HostCtrlCap::VS33) && mv == 3300
    }

    fn nth_irq(&self, n: usize) -> Option<u32> {
        self.platform.irq_table().get(n).copied()
    }

    fn present_state(&self) -> u32 {
        self.reg.read_reg::<PresState>().bits()
    }

    fn default_voltage_mask(&self, ocr: u32) -> u32 {
        self.platform.default_voltage_mask(ocr)
    }

    fn udelay(&self, us: u32) {
        self.platform.udelay(us)
    }

    fn non_removable(&self) -> bool {
        self.platform.non_removable()
    }
}
