//! Short-address allocation: an iterative binary search over the
//! 24-bit random addresses the devices draw at RANDOMISE, assigning
//! short addresses from 0 upward and withdrawing each numbered device
//! from the search.

use crate::base::address::{Long, Short};
use crate::common::commands::{Commands, DeviceCommands, GearCommands, InitialiseScope};
use crate::drivers::driver::{DaliDriver, DaliSendResult, YesNo};
use crate::phy::timing::RANDOMISE_SETTLE;
use crate::utils::long_address::set_search_addr_changed;
use log::{debug, info, warn};

/// The whole 24-bit search space. No device address can exceed this.
const TOP_SEARCH_ADDR: Long = 0xffffff;

/// Addresses assigned per class. Address 63 is reserved, so a full
/// bus leaves some devices unnumbered.
const ADDRESS_CAP: u8 = 63;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Gear,
    InputDevice,
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DeviceClass::Gear => write!(f, "control gear"),
            DeviceClass::InputDevice => write!(f, "input device"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceRecord {
    pub short: Short,
    pub class: DeviceClass,
}

/// What to do when the allocator is about to hand out a short address
/// slot that is already taken. The bus standard leaves this open, so
/// the caller decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Stop enumerating and report the colliding address
    Abort,
    /// Leave both devices alone and skip the slot
    Skip,
    /// Hand the slot out anyway
    Overwrite,
}

/// Whether a controller start runs a full enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumerationPolicy {
    Always,
    /// Only when some device answers the missing-short-address probe
    IfUnaddressed,
}

#[derive(Debug)]
pub enum Error {
    Send(DaliSendResult),
    /// A short-address slot was selected twice; see [`DuplicatePolicy`]
    DuplicateAddress(Short),
}

impl From<DaliSendResult> for Error {
    fn from(result: DaliSendResult) -> Error {
        Error::Send(result)
    }
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Send(res) => res.fmt(f),
            Error::DuplicateAddress(a) => {
                write!(f, "Short address {} already assigned", a)
            }
        }
    }
}

/// Result of one allocation pass over one device class.
#[derive(Debug, Default)]
pub struct AllocationReport {
    /// Addresses assigned by this pass, in assignment order
    pub assigned: Vec<DeviceRecord>,
    /// Addresses that were already assigned before this pass
    pub existing: u8,
    /// Devices withdrawn without an address because the space ran out
    pub withdrawn_unassigned: u8,
    /// Slots found taken when they should not have been
    pub duplicates: Vec<Short>,
    /// First slot still free after the pass
    pub first_free: u8,
}

#[derive(Debug, Clone, Copy)]
pub struct AllocateOptions {
    /// Keep already-assigned addresses and only number new devices
    pub incremental: bool,
    pub duplicates: DuplicatePolicy,
    /// First short address this pass may hand out
    pub first_short: u8,
}

impl Default for AllocateOptions {
    fn default() -> AllocateOptions {
        AllocateOptions {
            incremental: false,
            duplicates: DuplicatePolicy::Abort,
            first_short: 0,
        }
    }
}

enum Isolation {
    /// No device left in the search
    Exhausted,
    /// Exactly one device selected, holding this random address
    Found(Long),
    /// The search converged but the final check went silent
    Lost,
}

/// One binary descent: a termination check at the top of the search
/// space, 24 rounds clearing one candidate bit each and restoring it
/// when the bus goes silent, and a final verification COMPARE.
async fn isolate<C>(commands: &mut C, current: &mut Long) -> Result<Isolation, DaliSendResult>
where
    C: Commands,
{
    set_search_addr_changed(commands, TOP_SEARCH_ADDR, current).await?;
    if commands.compare().await? == YesNo::No {
        return Ok(Isolation::Exhausted);
    }
    let mut candidate = TOP_SEARCH_ADDR;
    for bit in (0..24).rev() {
        let trial = candidate & !(1 << bit);
        set_search_addr_changed(commands, trial, current).await?;
        match commands.compare().await? {
            // No device below the trial: the bit must stay set
            YesNo::No => {}
            _ => candidate = trial,
        }
    }
    set_search_addr_changed(commands, candidate, current).await?;
    match commands.compare().await? {
        YesNo::No => {
            warn!("search converged on {:06x} but the device went quiet", candidate);
            Ok(Isolation::Lost)
        }
        _ => Ok(Isolation::Found(candidate)),
    }
}

/// Read-only pass of incremental mode: isolate every device, read its
/// existing short address if it has one, and withdraw it. Returns with
/// every observed address marked in `slots` and `next_free` past the
/// highest one.
async fn survey_existing<C>(
    commands: &mut C,
    slots: &mut [bool; 64],
    next_free: &mut u8,
    policy: DuplicatePolicy,
    report: &mut AllocationReport,
) -> Result<(), Error>
where
    C: Commands,
{
    commands.initialise(InitialiseScope::All).await?;
    commands.randomise().await?;
    tokio::time::sleep(RANDOMISE_SETTLE).await;

    let mut current = u32::MAX;
    loop {
        match isolate(commands, &mut current).await? {
            Isolation::Exhausted => break,
            Isolation::Lost => {}
            Isolation::Found(long) => {
                match commands.query_short_address().await {
                    Ok(Some(short)) => {
                        let index = short.value() as usize;
                        if slots[index] {
                            // Two devices report the same short address
                            match policy {
                                DuplicatePolicy::Abort => {
                                    let _ = commands.terminate().await;
                                    return Err(Error::DuplicateAddress(short));
                                }
                                DuplicatePolicy::Skip => {
                                    warn!("duplicate short address {}, keeping both", short);
                                    report.duplicates.push(short);
                                }
                                DuplicatePolicy::Overwrite => {
                                    warn!("duplicate short address {}, renumbering", short);
                                    report.duplicates.push(short);
                                    // Unaddress this one; the assignment
                                    // pass picks it up again
                                    commands.clear_short_address().await?;
                                }
                            }
                        } else {
                            slots[index] = true;
                            report.existing += 1;
                            if short.value() >= *next_free {
                                *next_free = short.value() + 1;
                            }
                            debug!("device {:06x} already has address {}", long, short);
                        }
                    }
                    // An unaddressed device; the assignment pass will
                    // number it
                    Ok(None) => {}
                    Err(e) if e.is_timeout() => {}
                    Err(e) => return Err(e.into()),
                }
                commands.withdraw().await?;
            }
        }
        commands.initialise(InitialiseScope::All).await?;
    }
    commands.terminate().await?;
    Ok(())
}

/// Run one allocation pass for one device class. Returns the report
/// of what was assigned; anomalies short of an abort are carried in
/// the report rather than swallowed.
pub async fn assign_addresses<C>(
    commands: &mut C,
    class: DeviceClass,
    opts: &AllocateOptions,
) -> Result<AllocationReport, Error>
where
    C: Commands,
{
    let mut report = AllocationReport::default();
    let mut slots = [false; 64];
    let mut next_free = opts.first_short;

    if opts.incremental {
        // The survey marks only addresses it actually observes, so a
        // second sighting of the same address is a real duplicate and
        // not a collision with the reservation below.
        survey_existing(commands, &mut slots, &mut next_free, opts.duplicates, &mut report)
            .await?;
    }

    // Nothing below the reservation floor or the highest existing
    // address may be handed out
    for slot in slots.iter_mut().take(next_free as usize) {
        *slot = true;
    }

    let scope = if opts.incremental {
        InitialiseScope::Unaddressed
    } else {
        InitialiseScope::All
    };

    commands.initialise(scope).await?;
    commands.randomise().await?;
    tokio::time::sleep(RANDOMISE_SETTLE).await;

    let mut current = u32::MAX;
    loop {
        match isolate(commands, &mut current).await? {
            Isolation::Exhausted => break,
            Isolation::Lost => {
                debug!("lost the selected device, restarting the search");
            }
            Isolation::Found(long) => {
                // Find the slot for this device, honoring the
                // duplicate policy for slots already taken
                while next_free < ADDRESS_CAP && slots[next_free as usize] {
                    let taken = Short::new(next_free);
                    match opts.duplicates {
                        DuplicatePolicy::Abort => {
                            let _ = commands.terminate().await;
                            return Err(Error::DuplicateAddress(taken));
                        }
                        DuplicatePolicy::Skip => {
                            warn!("slot {} already taken, skipping", taken);
                            report.duplicates.push(taken);
                            next_free += 1;
                        }
                        DuplicatePolicy::Overwrite => {
                            warn!("slot {} already taken, reusing it", taken);
                            report.duplicates.push(taken);
                            break;
                        }
                    }
                }

                if next_free < ADDRESS_CAP {
                    let short = Short::new(next_free);
                    commands.program_short_address(short).await?;
                    if commands.verify_short_address(short).await? == YesNo::No {
                        warn!("device {:06x} did not accept address {}", long, short);
                    }
                    commands.withdraw().await?;
                    slots[next_free as usize] = true;
                    next_free += 1;
                    debug!("assigned {} to device {:06x}", short, long);
                    report.assigned.push(DeviceRecord { short, class });
                } else {
                    // Address space exhausted. Withdraw anyway so the
                    // search can move past this device.
                    commands.withdraw().await?;
                    report.withdrawn_unassigned += 1;
                    warn!("no address left for device {:06x}", long);
                }
            }
        }
        // Reopen the enumeration window for the next round
        commands.initialise(scope).await?;
    }
    commands.terminate().await?;

    report.first_free = next_free;
    info!(
        "{}: {} assigned, {} existing, {} without address",
        class,
        report.assigned.len(),
        report.existing,
        report.withdrawn_unassigned
    );
    Ok(report)
}

/// Decide whether a controller start needs an enumeration pass at all.
pub async fn should_enumerate<C>(
    commands: &mut C,
    policy: EnumerationPolicy,
) -> Result<bool, DaliSendResult>
where
    C: Commands,
{
    match policy {
        EnumerationPolicy::Always => Ok(true),
        EnumerationPolicy::IfUnaddressed => {
            Ok(commands.query_missing_short_address().await? != YesNo::No)
        }
    }
}

/// Everything found on the bus: control gear first, then input
/// devices numbered after them.
#[derive(Debug, Default)]
pub struct BusInventory {
    pub gear: AllocationReport,
    pub input_devices: AllocationReport,
}

impl BusInventory {
    /// Input-device short addresses, the ones the event walk visits.
    pub fn input_device_addresses(&self) -> Vec<Short> {
        self.input_devices.assigned.iter().map(|r| r.short).collect()
    }
}

/// Enumerate both device classes on the bus. Input devices are
/// numbered starting from the first address the gear pass left free.
pub async fn enumerate_bus(
    driver: &mut dyn DaliDriver,
    opts: &AllocateOptions,
) -> Result<BusInventory, Error> {
    let gear = {
        let mut commands = GearCommands::new(driver);
        assign_addresses(&mut commands, DeviceClass::Gear, opts).await?
    };
    let device_opts = AllocateOptions {
        first_short: gear.first_free,
        ..*opts
    };
    let input_devices = {
        let mut commands = DeviceCommands::new(driver);
        assign_addresses(&mut commands, DeviceClass::InputDevice, &device_opts).await?
    };
    Ok(BusInventory {
        gear,
        input_devices,
    })
}
