use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use crate::utils::utils_errors::BinpickError;
use crate::utils::utils_traits::{load_object_from_json_string, SaveAndLoadable};

pub const NUM_BIN_SLOTS: usize = 10;

/// One requested pick: which item, which bin it sits in, and whether it has
/// already been delivered to the tote.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkOrderEntry {
    pub item: String,
    /// Stored in the host record as "bin_A".."bin_L".
    pub bin: String,
    pub done: bool
}
impl WorkOrderEntry {
    pub fn bin_letter(&self) -> Result<char, BinpickError> {
        return match self.bin.chars().last() {
            Some(c) if ('A'..='L').contains(&c) => { Ok(c) }
            _ => { Err(BinpickError::new_precondition_violation(&format!("work order entry has malformed bin name: {}", self.bin), file!(), line!())) }
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WorkOrder {
    pub entries: Vec<WorkOrderEntry>
}

/// Contents of the 12 shelf bins, up to `NUM_BIN_SLOTS` item names per bin.
/// A vacated slot keeps its position but holds an empty string, matching the
/// persisted record format.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BinContents {
    bins: BTreeMap<char, Vec<String>>
}
impl BinContents {
    pub fn new_empty() -> Self {
        let mut bins = BTreeMap::new();
        for bin in 'A'..='L' {
            bins.insert(bin, vec![String::new(); NUM_BIN_SLOTS]);
        }
        Self { bins }
    }
    pub fn place(&mut self, bin: char, item: &str) -> Result<(), BinpickError> {
        let slots = self.slots_mut(bin)?;
        for slot in slots.iter_mut() {
            if slot.is_empty() {
                *slot = item.to_string();
                return Ok(());
            }
        }
        return Err(BinpickError::new_generic_error_str(&format!("bin {} is full", bin), file!(), line!()));
    }
    /// Empties the first slot holding `item`.  Returns false if the item was
    /// not present.
    pub fn vacate(&mut self, bin: char, item: &str) -> Result<bool, BinpickError> {
        let slots = self.slots_mut(bin)?;
        for slot in slots.iter_mut() {
            if slot == item {
                slot.clear();
                return Ok(true);
            }
        }
        return Ok(false);
    }
    pub fn slots(&self, bin: char) -> Result<&Vec<String>, BinpickError> {
        return match self.bins.get(&bin) {
            Some(s) => { Ok(s) }
            None => { Err(BinpickError::new_precondition_violation(&format!("unknown bin '{}'", bin), file!(), line!())) }
        }
    }
    fn slots_mut(&mut self, bin: char) -> Result<&mut Vec<String>, BinpickError> {
        return match self.bins.get_mut(&bin) {
            Some(s) => { Ok(s) }
            None => { Err(BinpickError::new_precondition_violation(&format!("unknown bin '{}'", bin), file!(), line!())) }
        }
    }
    pub fn contains(&self, bin: char, item: &str) -> Result<bool, BinpickError> {
        Ok(self.slots(bin)?.iter().any(|s| s == item))
    }
}

/// Append-only record of items delivered to the order tote.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ToteContents {
    items: Vec<String>
}
impl ToteContents {
    pub fn push(&mut self, item: &str) {
        self.items.push(item.to_string());
    }
    pub fn items(&self) -> &Vec<String> {
        &self.items
    }
}

/// The full persisted task record: the work order plus the bin and tote
/// contents.  Rewritten to disk after every successful placement.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PickTaskRecord {
    pub work_order: WorkOrder,
    pub bin_contents: BinContents,
    pub tote_contents: ToteContents
}
impl PickTaskRecord {
    pub fn new(work_order: WorkOrder, bin_contents: BinContents) -> Self {
        Self { work_order, bin_contents, tote_contents: ToteContents::default() }
    }
    /// Marks order entry `order_index` done, vacates the item's bin slot, and
    /// appends the item to the tote.  This is the only mutation point of the
    /// shared record; it runs when a placement plan has been handed to the
    /// controller.
    pub fn complete_placement(&mut self, order_index: usize) -> Result<(), BinpickError> {
        if order_index >= self.work_order.entries.len() {
            return Err(BinpickError::new_idx_out_of_bound_error(order_index, self.work_order.entries.len(), file!(), line!()));
        }
        let (item, bin) = {
            let entry = &mut self.work_order.entries[order_index];
            entry.done = true;
            (entry.item.clone(), entry.bin_letter()?)
        };
        self.bin_contents.vacate(bin, &item)?;
        self.tote_contents.push(&item);
        return Ok(());
    }
}
impl SaveAndLoadable for PickTaskRecord {
    type SaveType = PickTaskRecord;

    fn get_save_serialization_object(&self) -> Self::SaveType {
        self.clone()
    }
    fn load_from_json_string(json_str: &str) -> Result<Self, BinpickError> where Self: Sized {
        load_object_from_json_string(json_str)
    }
}

#[derive(Clone, Debug)]
pub struct TargetSelection {
    pub order_index: usize,
    pub item: String,
    pub bin: char,
    pub arm: String
}

/// Rotating priority list over item names plus the per-object prioritized
/// end-effector context map that decides which arm serves which item.
#[derive(Clone, Debug)]
pub struct ObjectPriorityList {
    names: Vec<String>,
    ee_contexts: BTreeMap<String, Vec<String>>
}
impl ObjectPriorityList {
    pub fn new(names: Vec<String>, ee_contexts: BTreeMap<String, Vec<String>>) -> Self {
        Self { names, ee_contexts }
    }
    /// Scans priorities in order for the first undone work-order entry whose
    /// item matches, rotates the matched name to the back of the list, and
    /// derives the serving arm from the object's first end-effector context.
    pub fn select_target(&mut self, work_order: &WorkOrder) -> Result<Option<TargetSelection>, BinpickError> {
        for counter in 0..self.names.len() {
            for (j, entry) in work_order.entries.iter().enumerate() {
                if self.names[counter] == entry.item && !entry.done {
                    let bin = entry.bin_letter()?;
                    let arm = self.arm_for(&entry.item)?;
                    let selection = TargetSelection { order_index: j, item: entry.item.clone(), bin, arm };
                    self.names[counter..].rotate_left(1);
                    return Ok(Some(selection));
                }
            }
        }
        return Ok(None);
    }
    fn arm_for(&self, item: &str) -> Result<String, BinpickError> {
        let contexts = match self.ee_contexts.get(item) {
            Some(c) if !c.is_empty() => { c }
            _ => { return Err(BinpickError::new_precondition_violation(&format!("no prioritized end-effector context for object {}", item), file!(), line!())); }
        };
        return if contexts[0].contains("left") { Ok("left".to_string()) } else { Ok("right".to_string()) }
    }
    pub fn names(&self) -> &Vec<String> {
        &self.names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with(item: &str, bin: char) -> PickTaskRecord {
        let mut bin_contents = BinContents::new_empty();
        bin_contents.place(bin, item).unwrap();
        bin_contents.place(bin, "other_thing").unwrap();
        let work_order = WorkOrder {
            entries: vec![WorkOrderEntry { item: item.to_string(), bin: format!("bin_{}", bin), done: false }]
        };
        PickTaskRecord::new(work_order, bin_contents)
    }

    #[test]
    fn placement_vacates_slot_and_appends_to_tote() {
        let mut record = record_with("dove_beauty_bar", 'B');
        record.complete_placement(0).unwrap();
        assert!(record.work_order.entries[0].done);
        assert!(!record.bin_contents.contains('B', "dove_beauty_bar").unwrap());
        assert_eq!(record.bin_contents.slots('B').unwrap()[0], "");
        assert_eq!(record.bin_contents.slots('B').unwrap()[1], "other_thing");
        let tote = record.tote_contents.items();
        assert_eq!(tote.len(), 1);
        assert_eq!(tote.last().unwrap(), "dove_beauty_bar");
    }

    #[test]
    fn placement_appends_exactly_once() {
        let mut record = record_with("crayola_24_ct", 'E');
        record.complete_placement(0).unwrap();
        let occurrences = record.tote_contents.items().iter().filter(|i| *i == "crayola_24_ct").count();
        assert_eq!(occurrences, 1);
    }

    #[test]
    fn record_round_trips_through_json() {
        let mut record = record_with("kleenex_tissue_box", 'C');
        record.complete_placement(0).unwrap();
        let s = record.get_serialization_string();
        let loaded = PickTaskRecord::load_from_json_string(&s).unwrap();
        assert!(loaded.work_order.entries[0].done);
        assert_eq!(loaded.tote_contents.items(), record.tote_contents.items());
    }

    #[test]
    fn select_target_rotates_priorities() {
        let mut contexts = BTreeMap::new();
        contexts.insert("a_item".to_string(), vec!["left_arm_context".to_string()]);
        contexts.insert("b_item".to_string(), vec!["right_arm_context".to_string()]);
        let mut priorities = ObjectPriorityList::new(vec!["a_item".to_string(), "b_item".to_string()], contexts);
        let work_order = WorkOrder {
            entries: vec![
                WorkOrderEntry { item: "b_item".to_string(), bin: "bin_D".to_string(), done: false },
                WorkOrderEntry { item: "a_item".to_string(), bin: "bin_A".to_string(), done: false }
            ]
        };

        let first = priorities.select_target(&work_order).unwrap().unwrap();
        assert_eq!(first.item, "a_item");
        assert_eq!(first.order_index, 1);
        assert_eq!(first.bin, 'A');
        assert_eq!(first.arm, "left");
        // The matched name moved to the back.
        assert_eq!(priorities.names()[0], "b_item");
    }

    #[test]
    fn select_target_skips_done_entries() {
        let mut contexts = BTreeMap::new();
        contexts.insert("a_item".to_string(), vec!["right_arm_context".to_string()]);
        let mut priorities = ObjectPriorityList::new(vec!["a_item".to_string()], contexts);
        let work_order = WorkOrder {
            entries: vec![WorkOrderEntry { item: "a_item".to_string(), bin: "bin_A".to_string(), done: true }]
        };
        assert!(priorities.select_target(&work_order).unwrap().is_none());
    }
}
