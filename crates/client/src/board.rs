use board_protocol::task::{Stage, Task};

/// Where a card was dropped: column and index within that column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardDrop {
    pub task_id: i64,
    pub to: Stage,
    pub index: usize,
}

/// Ids of `stage` in display order.
pub fn column_ids(tasks: &[Task], stage: Stage) -> Vec<i64> {
    let mut column: Vec<&Task> = tasks.iter().filter(|t| t.col_id == stage).collect();
    column.sort_by_key(|t| (t.order_position, t.id));
    column.into_iter().map(|t| t.id).collect()
}

fn renumber(tasks: &mut [Task], ordered_ids: &[i64]) {
    for (position, id) in ordered_ids.iter().enumerate() {
        if let Some(task) = tasks.iter_mut().find(|t| t.id == *id) {
            task.order_position = position as i64;
        }
    }
}

/// Applies a drop to the local list: the card lands at `index` (clamped) in
/// the target column and both affected columns are renumbered from zero.
/// Returns the card's new `order_position`, or `None` for an unknown id.
pub fn apply_drop(tasks: &mut [Task], drop: CardDrop) -> Option<i64> {
    let from = tasks.iter().find(|t| t.id == drop.task_id)?.col_id;

    let mut target: Vec<i64> = column_ids(tasks, drop.to)
        .into_iter()
        .filter(|id| *id != drop.task_id)
        .collect();
    let index = drop.index.min(target.len());
    target.insert(index, drop.task_id);

    if let Some(task) = tasks.iter_mut().find(|t| t.id == drop.task_id) {
        task.col_id = drop.to;
    }
    renumber(tasks, &target);
    if from != drop.to {
        let source = column_ids(tasks, from);
        renumber(tasks, &source);
    }
    Some(index as i64)
}
