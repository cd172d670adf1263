//! CAN to network forwarding loop.

use core::net::SocketAddr;

use caneth::DATAGRAM_LEN;

use crate::config::{BitRate, BusConfig, Timing};
use crate::endpoint::{CanEndpoint, Delay, NetworkEndpoint};
use crate::error::{BridgeError, FilterKindMismatch};
use crate::filter::{AdmissionFilter, ListFilter, SingleFilter};

/// Bridge lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum State {
    Stopped,
    Running,
}

/// What a single forwarding cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct PollReport {
    /// Datagrams decoded and transmitted on the bus.
    pub to_can: usize,
    /// Bus frames sent to the remote endpoint.
    pub to_network: usize,
    /// Bus frames rejected by the admission filter.
    pub filtered: usize,
    /// Datagrams that failed to decode or carry an identifier wider than
    /// their frame format allows.
    pub malformed: usize,
    pub can_failures: usize,
    pub network_failures: usize,
}

/// Bridge between one CAN endpoint and one network endpoint.
///
/// Configuration requests are plain `&mut self` calls, so they can never
/// interleave with a forwarding cycle. Callers driving the bridge from more
/// than one context must put it behind a mutex.
pub struct Bridge<C, N> {
    // endpoints
    can: C,
    network: N,

    // configuration
    filter: AdmissionFilter,
    config: BusConfig,
    timing: Timing,

    // restored by restart
    boot_filter: AdmissionFilter,
    boot_config: Option<BusConfig>,

    // state
    state: State,
}

impl<C: CanEndpoint, N: NetworkEndpoint> Bridge<C, N> {
    /// Creates a new, stopped [`Bridge`].
    pub fn new(can: C, network: N, filter: AdmissionFilter) -> Self {
        Bridge {
            can,
            network,
            boot_filter: filter.clone(),
            filter,
            config: BusConfig::default(),
            timing: Timing::default(),
            boot_config: None,
            state: State::Stopped,
        }
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == State::Running
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn filter(&self) -> &AdmissionFilter {
        &self.filter
    }

    /// Arm the bus at `config.bit_rate` and open the network endpoint.
    ///
    /// On failure nothing is left armed and the bridge stays stopped.
    pub fn start(
        &mut self,
        config: BusConfig,
    ) -> Result<(), BridgeError<C::Error, N::Error>> {
        if self.is_running() {
            return Err(BridgeError::AlreadyRunning);
        }

        if let Err(err) = self.can.start(config.bit_rate) {
            #[cfg(feature = "defmt-03")]
            defmt::error!(
                "Failed to start bus at {}: {}",
                config.bit_rate,
                defmt::Debug2Format(&err)
            );
            return Err(BridgeError::BusInit(err));
        }

        if let Err(err) = self.network.open() {
            #[cfg(feature = "defmt-03")]
            defmt::error!(
                "Failed to open network endpoint: {}",
                defmt::Debug2Format(&err)
            );
            self.can.stop();
            return Err(BridgeError::NetworkInit(err));
        }

        self.config = config;
        self.boot_config.get_or_insert(config);
        self.state = State::Running;

        #[cfg(feature = "defmt-03")]
        defmt::info!("Bridge running at {}", config.bit_rate);

        Ok(())
    }

    /// Release both endpoints. Stopping a stopped bridge is a no-op.
    pub fn stop(&mut self) {
        if !self.is_running() {
            return;
        }

        self.can.stop();
        self.network.close();
        self.state = State::Stopped;

        #[cfg(feature = "defmt-03")]
        defmt::info!("Bridge stopped");
    }

    /// Start again with the current configuration, including a bit rate
    /// recorded by [`update_bit_rate`](Self::update_bit_rate) while stopped.
    pub fn resume(&mut self) -> Result<(), BridgeError<C::Error, N::Error>> {
        self.start(self.config)
    }

    /// Tear everything down and start again from the boot configuration
    /// and filter.
    pub fn restart(&mut self) -> Result<(), BridgeError<C::Error, N::Error>> {
        self.stop();

        self.filter = self.boot_filter.clone();
        let config = self.boot_config.unwrap_or_default();

        self.start(config)
    }

    /// Restart the bus with another timing profile.
    ///
    /// If the bus refuses `bit_rate` the previous profile is armed again and
    /// the bus error is returned. Should that fail too, the bridge stops.
    pub fn reconfigure_bit_rate(
        &mut self,
        bit_rate: BitRate,
    ) -> Result<(), BridgeError<C::Error, N::Error>> {
        if !self.is_running() {
            return Err(BridgeError::NotRunning);
        }

        let previous = self.config.bit_rate;

        self.can.stop();
        let err = match self.can.start(bit_rate) {
            Ok(()) => {
                self.config.bit_rate = bit_rate;

                #[cfg(feature = "defmt-03")]
                defmt::info!("Bus restarted at {}", bit_rate);

                return Ok(());
            }
            Err(err) => err,
        };

        #[cfg(feature = "defmt-03")]
        defmt::error!(
            "Failed to restart bus at {}: {}",
            bit_rate,
            defmt::Debug2Format(&err)
        );

        if let Err(_err) = self.can.start(previous) {
            #[cfg(feature = "defmt-03")]
            defmt::error!(
                "Failed to restore bus at {}: {}",
                previous,
                defmt::Debug2Format(&_err)
            );

            self.network.close();
            self.state = State::Stopped;
        }

        Err(BridgeError::BusInit(err))
    }

    /// Select a bit rate profile by name.
    ///
    /// A running bridge restarts its bus, a stopped one only records the
    /// profile for [`resume`](Self::resume). Unknown names leave everything
    /// untouched.
    pub fn update_bit_rate(
        &mut self,
        name: &str,
    ) -> Result<(), BridgeError<C::Error, N::Error>> {
        let bit_rate: BitRate = name.parse()?;

        if self.is_running() {
            self.reconfigure_bit_rate(bit_rate)
        } else {
            self.config.bit_rate = bit_rate;
            Ok(())
        }
    }

    /// Send subsequent bus frames to `remote`.
    pub fn update_remote_endpoint(&mut self, remote: SocketAddr) {
        self.config.remote = remote;
    }

    pub fn set_filter_target(
        &mut self,
        id: u32,
    ) -> Result<(), FilterKindMismatch> {
        self.single_filter()?.set_target(id);
        Ok(())
    }

    pub fn set_filter_enabled(
        &mut self,
        enabled: bool,
    ) -> Result<(), FilterKindMismatch> {
        self.single_filter()?.set_enabled(enabled);
        Ok(())
    }

    /// Returns `false` if `id` was already listed.
    pub fn add_to_whitelist(
        &mut self,
        id: u32,
    ) -> Result<bool, FilterKindMismatch> {
        Ok(self.list_filter()?.add_to_whitelist(id))
    }

    /// Returns `false` if `id` was already listed.
    pub fn add_to_blacklist(
        &mut self,
        id: u32,
    ) -> Result<bool, FilterKindMismatch> {
        Ok(self.list_filter()?.add_to_blacklist(id))
    }

    pub fn clear_whitelist(&mut self) -> Result<(), FilterKindMismatch> {
        self.list_filter()?.clear_whitelist();
        Ok(())
    }

    pub fn clear_blacklist(&mut self) -> Result<(), FilterKindMismatch> {
        self.list_filter()?.clear_blacklist();
        Ok(())
    }

    pub fn set_allow_all_mode(
        &mut self,
        allow_all: bool,
    ) -> Result<(), FilterKindMismatch> {
        self.list_filter()?.set_allow_all(allow_all);
        Ok(())
    }

    fn single_filter(
        &mut self,
    ) -> Result<&mut SingleFilter, FilterKindMismatch> {
        let configured = self.filter.kind();
        self.filter
            .as_single_mut()
            .ok_or(FilterKindMismatch { configured })
    }

    fn list_filter(&mut self) -> Result<&mut ListFilter, FilterKindMismatch> {
        let configured = self.filter.kind();
        self.filter
            .as_list_mut()
            .ok_or(FilterKindMismatch { configured })
    }

    /// Run one forwarding cycle.
    ///
    /// At most one datagram is moved onto the bus, then the bus receive
    /// queue is drained to the network. Failures are counted in the report
    /// and never end the cycle early.
    pub fn poll(
        &mut self,
    ) -> Result<PollReport, BridgeError<C::Error, N::Error>> {
        if !self.is_running() {
            return Err(BridgeError::NotRunning);
        }

        let mut report = PollReport::default();

        self.forward_to_can(&mut report);
        self.forward_to_network(&mut report);

        Ok(report)
    }

    fn forward_to_can(&mut self, report: &mut PollReport) {
        let mut buf = [0u8; DATAGRAM_LEN];

        let len = match self.network.recv(&mut buf) {
            Ok(Some(len)) => len,
            Ok(None) => return,
            Err(_err) => {
                #[cfg(feature = "defmt-03")]
                defmt::warn!(
                    "Failed to receive datagram: {}",
                    defmt::Debug2Format(&_err)
                );
                report.network_failures += 1;
                return;
            }
        };

        let frame = match caneth::decode(&buf[..len]) {
            Ok(frame) => frame,
            Err(_err) => {
                #[cfg(feature = "defmt-03")]
                defmt::debug!("Dropping datagram: {}", _err);
                report.malformed += 1;
                return;
            }
        };

        if !frame.id_in_range() {
            #[cfg(feature = "defmt-03")]
            defmt::debug!(
                "Dropping datagram with out of range identifier {:#x}",
                frame.raw_id()
            );
            report.malformed += 1;
            return;
        }

        match self.can.transmit(&frame, self.timing.transmit_timeout) {
            Ok(()) => report.to_can += 1,
            Err(_err) => {
                #[cfg(feature = "defmt-03")]
                defmt::warn!(
                    "Failed to forward frame {:#x} to bus: {}",
                    frame.raw_id(),
                    defmt::Debug2Format(&_err)
                );
                report.can_failures += 1;
            }
        }
    }

    fn forward_to_network(&mut self, report: &mut PollReport) {
        loop {
            let frame = match self.can.receive() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(_err) => {
                    #[cfg(feature = "defmt-03")]
                    defmt::warn!(
                        "Failed to receive from bus: {}",
                        defmt::Debug2Format(&_err)
                    );
                    report.can_failures += 1;
                    break;
                }
            };

            if !self.filter.permits(frame.raw_id()) {
                report.filtered += 1;
                continue;
            }

            let datagram = caneth::encode(&frame);
            match self.network.send_to(self.config.remote, &datagram) {
                Ok(()) => report.to_network += 1,
                Err(_err) => {
                    #[cfg(feature = "defmt-03")]
                    defmt::warn!(
                        "Failed to forward frame {:#x} to network: {}",
                        frame.raw_id(),
                        defmt::Debug2Format(&_err)
                    );
                    report.network_failures += 1;
                }
            }
        }
    }

    /// Drive the bridge until it is stopped.
    ///
    /// Each cycle runs [`poll`](Self::poll), then hands the bridge and the
    /// cycle's report to `control` to apply pending configuration requests,
    /// then waits for [`Timing::poll_interval`].
    pub fn run<D: Delay>(
        &mut self,
        delay: &mut D,
        mut control: impl FnMut(&mut Self, &PollReport),
    ) -> Result<(), BridgeError<C::Error, N::Error>> {
        if !self.is_running() {
            return Err(BridgeError::NotRunning);
        }

        while self.is_running() {
            let report = self.poll()?;
            control(&mut *self, &report);

            if self.is_running() {
                delay.delay(self.timing.poll_interval);
            }
        }

        Ok(())
    }
}
