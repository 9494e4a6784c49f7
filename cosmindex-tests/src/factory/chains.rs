use cosmindex::UnsavedChain;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Suffix that keeps every natural key a test writes out of other tests' way
pub fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect()
}

pub fn random_chain() -> UnsavedChain {
    let suffix = random_suffix();

    UnsavedChain::new(&format!("testchain-{suffix}"), &format!("Test Chain {suffix}"))
}
