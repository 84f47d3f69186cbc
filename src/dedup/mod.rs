use std::collections::hash_map::Entry;
use std::collections::HashMap;
use log::info;
use crate::transaction::{Fingerprint, Transaction};

/// Collapse transactions that represent the same real-world event but appear
/// in more than one export (overlapping statement date ranges). Exactly one
/// representative per distinct fingerprint is kept.
///
/// Tie-break among duplicates: the transaction with the lexicographically
/// smallest (account_id, source_file, row_number) wins. The output is sorted
/// by the same key, so repeated runs produce identical sequences regardless
/// of input file order.
pub(crate) fn dedupe(transactions: Vec<Transaction>) -> (Vec<Transaction>, usize) {
    let total = transactions.len();
    let mut seen: HashMap<Fingerprint, Transaction> = HashMap::with_capacity(total);
    let mut removed = 0usize;

    for transaction in transactions {
        match seen.entry(transaction.fingerprint()) {
            Entry::Vacant(entry) => {
                entry.insert(transaction);
            }
            Entry::Occupied(mut entry) => {
                removed += 1;
                if transaction.provenance_key() < entry.get().provenance_key() {
                    entry.insert(transaction);
                }
            }
        }
    }

    let mut kept: Vec<Transaction> = seen.into_values().collect();
    kept.sort_by(|a, b| a.provenance_key().cmp(&b.provenance_key()));

    if removed > 0 {
        info!("Removed {removed} duplicate transactions out of {total}");
    }
    (kept, removed)
}
