//! Turns a fetched table into the records of a new catalog.
//!
//! Ids are minted here, before anything is written, so a table that breaks
//! the parent chain halfway through is rejected as a whole.

use tracing::warn;
use uuid::Uuid;

use super::classifier::{classify, ClassifyError, RowInstruction, SyncContext};
use crate::catalog::model::{CatalogRecord, Dish, Menu, Submenu};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayPlan {
    /// Parents always precede their children.
    pub records: Vec<CatalogRecord>,
    /// `(dish_id, percent)` for dishes that carry a discount.
    pub discounts: Vec<(String, f64)>,
    pub ignored_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("row {row}: {source}")]
pub struct ReplayError {
    /// Zero-based index into the table.
    pub row: usize,
    pub source: ClassifyError,
}

pub fn plan_replay(table: &[Vec<String>]) -> Result<ReplayPlan, ReplayError> {
    let mut plan = ReplayPlan::default();
    let mut ctx = SyncContext::default();

    for (index, row) in table.iter().enumerate() {
        let instruction = classify(row, &ctx).map_err(|source| ReplayError { row: index, source })?;
        let Some(instruction) = instruction else {
            warn!(row = index, cells = row.len(), "Ignoring row of unknown shape");
            plan.ignored_rows += 1;
            continue;
        };

        let id = Uuid::new_v4().to_string();
        match instruction {
            RowInstruction::Menu(draft) => {
                ctx = ctx.with_menu(&id);
                plan.records.push(CatalogRecord::Menu(Menu {
                    id,
                    title: draft.title,
                    description: draft.description,
                }));
            }
            RowInstruction::Submenu { menu_id, draft } => {
                ctx = ctx.with_submenu(&id);
                plan.records.push(CatalogRecord::Submenu(Submenu {
                    id,
                    menu_id,
                    title: draft.title,
                    description: draft.description,
                }));
            }
            RowInstruction::Dish { submenu_id, draft } => {
                plan.records.push(CatalogRecord::Dish(Dish {
                    id,
                    submenu_id,
                    title: draft.title,
                    description: draft.description,
                    price: draft.price,
                }));
            }
            RowInstruction::DishWithDiscount {
                submenu_id,
                draft,
                discount,
            } => {
                plan.discounts.push((id.clone(), discount));
                plan.records.push(CatalogRecord::Dish(Dish {
                    id,
                    submenu_id,
                    title: draft.title,
                    description: draft.description,
                    price: draft.price,
                }));
            }
        }
    }

    Ok(plan)
}
