use crate::base::address::Long;
use crate::common::commands::Commands;
use crate::drivers::driver::DaliSendResult;

/// Program the global search address into all devices in the
/// enumeration window.
pub async fn set_search_addr<C>(commands: &mut C, addr: Long) -> Result<(), DaliSendResult>
where
    C: Commands,
{
    commands.searchaddr_h((addr >> 16 & 0xff) as u8).await?;
    commands.searchaddr_m((addr >> 8 & 0xff) as u8).await?;
    commands.searchaddr_l((addr & 0xff) as u8).await?;
    Ok(())
}

/// Like [`set_search_addr`] but only sends the bytes that differ from
/// what the devices already hold, tracked in `current`. The binary
/// descent mostly touches one byte per step, so this saves two thirds
/// of the traffic. Seed `current` with a value outside the 24-bit
/// range to force a full set.
pub async fn set_search_addr_changed<C>(
    commands: &mut C,
    addr: Long,
    current: &mut Long,
) -> Result<(), DaliSendResult>
where
    C: Commands,
{
    let diff = addr ^ *current;
    if (diff & 0xff0000) != 0 {
        commands.searchaddr_h((addr >> 16 & 0xff) as u8).await?;
    }
    if (diff & 0x00ff00) != 0 {
        commands.searchaddr_m((addr >> 8 & 0xff) as u8).await?;
    }
    if (diff & 0x0000ff) != 0 {
        commands.searchaddr_l((addr & 0xff) as u8).await?;
    }
    *current = addr;
    Ok(())
}
