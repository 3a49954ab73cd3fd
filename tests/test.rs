#![no_std]
#![no_main]
#![feature(used_with_arg)]

extern crate alloc;

#[bare_test::tests]
mod tests {
    use core::ptr::NonNull;
    use core::time::Duration;

    use alloc::boxed::Box;
    use alloc::vec;
    use bare_test::{
        GetIrqConfig,
        globals::{PlatformInfoKind, global_val},
        mem::mmu::iomap,
        time::spin_delay,
    };
    use log::*;
    use sdhc_sd::boards;
    use sdhc_sd::lifecycle;
    use sdhc_sd::platform::{DmaAllocFlags, HostId, Platform};
    use sdhc_sd::storage::{Dataport, StateFlags};
    use sdhc_sd::Kernel;

    const READ_START_BLOCK: i64 = 131072;
    const READ_BLOCKS: usize = 4;
    const BLOCK_SIZE: usize = 512;

    /// Wraps a caller-owned buffer in the fixed-size shared region the
    /// storage surface expects (spec section 3, "Dataport"). Real glue
    /// code backs this with whatever shared-memory region the RPC
    /// transport negotiated; here it's just a heap `Vec`.
    struct VecDataport(alloc::vec::Vec<u8>);

    impl Dataport for VecDataport {
        fn as_slice(&self) -> &[u8] {
            &self.0
        }
        fn as_mut_slice(&mut self) -> &mut [u8] {
            &mut self.0
        }
    }

    /// Board support backed by the devicetree-reported register window,
    /// covering the one onboard SDHC instance this harness targets.
    struct TestPlatform {
        irq: u32,
    }

    impl Platform for TestPlatform {
        unsafe fn map(&self, paddr: usize, size: usize) -> NonNull<u8> {
            iomap(paddr.into(), size)
        }

        fn alloc_dma(
            &self,
            _size: usize,
            _align: usize,
            _flags: DmaAllocFlags,
        ) -> Option<(NonNull<u8>, usize)> {
            // No IOMMU/bounce-buffer wiring in this harness; PIO only.
            None
        }

        fn is_voltage_compatible(&self, mv: u32) -> bool {
            mv <= 3_300
        }

        fn default_voltage_mask(&self, _ocr: u32) -> u32 {
            // Standard 3.2-3.4 V range, offered unconditionally.
            0x0030_0000
        }

        fn irq_table(&self) -> &[u32] {
            core::slice::from_ref(&self.irq)
        }

        fn default_id(&self) -> HostId {
            HostId::Imx6(0)
        }
    }

    #[test]
    fn test_work() {
        let fdt = match &global_val().platform_info {
            PlatformInfoKind::DeviceTree(fdt) => fdt.get(),
        };

        let node = fdt
            .find_compatible(&["fsl,imx6q-usdhc", "fsl,imx6sx-usdhc"])
            .next()
            .unwrap();
        let reg = node.reg().unwrap().next().unwrap();
        let irq = node
            .irq_info()
            .map(|info| info.cfgs[0].irq as u32)
            .unwrap_or(boards::imx6::IRQS[0]);

        info!(
            "sdhc reg: {:#x}, size: {:#x}, irq: {irq}",
            reg.address,
            reg.size.unwrap()
        );

        let platform = Box::new(TestPlatform { irq });

        let storage = lifecycle::init(platform, reg.address as usize, reg.size.unwrap());

        let (err, state) = storage.get_state();
        info!("storage state: {err:?}, flags: {state:#x}");
        assert!(state & StateFlags::MEDIUM_PRESENT.bits() != 0, "no card detected");

        let (err, block_size) = storage.get_block_size();
        assert_eq!(err, sdhc_sd::storage::DriverError::Success);
        assert_eq!(block_size, BLOCK_SIZE);

        let mut dataport = VecDataport(vec![0u8; BLOCK_SIZE * READ_BLOCKS]);
        let (err, read) = storage.read(
            READ_START_BLOCK * BLOCK_SIZE as i64,
            BLOCK_SIZE * READ_BLOCKS,
            &mut dataport,
        );
        assert_eq!(err, sdhc_sd::storage::DriverError::Success);
        assert_eq!(read, BLOCK_SIZE * READ_BLOCKS);

        info!("read {read} bytes from SD card");
        info!("test_work passed\n");
    }

    fn sleep(duration: Duration) {
        spin_delay(duration);
    }

    struct KernelImpl;

    impl Kernel for KernelImpl {
        fn sleep(duration: Duration) {
            sleep(duration);
        }
    }

    sdhc_sd::set_impl!(KernelImpl);
}
