/// Currency amounts in base units.
pub type Amount = u128;

/// Base units per ether.
pub const ETHER: Amount = 1_000_000_000_000_000_000;

/// Renders an amount as ether with up to 18 decimals, trailing zeros trimmed.
pub fn format_ether(amount: Amount) -> String {
    let whole = amount / ETHER;
    let frac = amount % ETHER;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:018}", frac);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}
