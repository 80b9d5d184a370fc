//! Positional row classification.
//!
//! The external table has no foreign keys: a row's kind follows from how many
//! cells it has, and its parent is whichever menu or submenu came last.
//!
//! | cells | row                                            |
//! |-------|------------------------------------------------|
//! | 3     | menu `[_, title, description]`                 |
//! | 4     | submenu `[_, _, title, description]`           |
//! | 6     | dish `[_, _, _, title, description, price]`    |
//! | 7     | dish as above plus a discount percentage       |
//!
//! Any other length classifies as nothing.

use thiserror::Error;

use crate::catalog::model::{DishDraft, MenuDraft, Price, SubmenuDraft};

pub type Row = Vec<String>;
pub type Table = Vec<Row>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("submenu row with no menu before it")]
    MissingMenu,
    #[error("dish row with no submenu before it")]
    MissingSubmenu,
    #[error("invalid price {0:?}")]
    InvalidPrice(String),
    #[error("invalid discount {0:?}, expected a percentage between 0 and 100")]
    InvalidDiscount(String),
}

/// Most recent parents seen in the current pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncContext {
    pub current_menu_id: Option<String>,
    pub current_submenu_id: Option<String>,
}

impl SyncContext {
    /// A new menu starts with no submenu. A dish row right after a menu row
    /// is rejected rather than attached to the previous menu's last submenu.
    pub fn with_menu(&self, menu_id: impl Into<String>) -> Self {
        Self {
            current_menu_id: Some(menu_id.into()),
            current_submenu_id: None,
        }
    }

    pub fn with_submenu(&self, submenu_id: impl Into<String>) -> Self {
        Self {
            current_menu_id: self.current_menu_id.clone(),
            current_submenu_id: Some(submenu_id.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowInstruction {
    Menu(MenuDraft),
    Submenu {
        menu_id: String,
        draft: SubmenuDraft,
    },
    Dish {
        submenu_id: String,
        draft: DishDraft,
    },
    DishWithDiscount {
        submenu_id: String,
        draft: DishDraft,
        discount: f64,
    },
}

pub fn classify(row: &[String], ctx: &SyncContext) -> Result<Option<RowInstruction>, ClassifyError> {
    let instruction = match row {
        [_, title, description] => RowInstruction::Menu(MenuDraft {
            title: title.clone(),
            description: description.clone(),
        }),
        [_, _, title, description] => {
            let menu_id = ctx.current_menu_id.clone().ok_or(ClassifyError::MissingMenu)?;
            RowInstruction::Submenu {
                menu_id,
                draft: SubmenuDraft {
                    title: title.clone(),
                    description: description.clone(),
                },
            }
        }
        [_, _, _, title, description, price] => {
            let submenu_id = current_submenu(ctx)?;
            RowInstruction::Dish {
                submenu_id,
                draft: dish_draft(title, description, price)?,
            }
        }
        [_, _, _, title, description, price, discount] => {
            let submenu_id = current_submenu(ctx)?;
            let draft = dish_draft(title, description, price)?;
            match parse_discount(discount)? {
                Some(discount) => RowInstruction::DishWithDiscount {
                    submenu_id,
                    draft,
                    discount,
                },
                None => RowInstruction::Dish { submenu_id, draft },
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(instruction))
}

fn current_submenu(ctx: &SyncContext) -> Result<String, ClassifyError> {
    ctx.current_submenu_id
        .clone()
        .ok_or(ClassifyError::MissingSubmenu)
}

fn dish_draft(title: &str, description: &str, price: &str) -> Result<DishDraft, ClassifyError> {
    let price =
        Price::parse_localized(price).map_err(|_| ClassifyError::InvalidPrice(price.to_string()))?;
    Ok(DishDraft {
        title: title.to_string(),
        description: description.to_string(),
        price,
    })
}

/// Blank cell means no discount.
fn parse_discount(raw: &str) -> Result<Option<f64>, ClassifyError> {
    let trimmed = raw.trim().trim_end_matches('%').trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match trimmed.replace(',', ".").parse::<f64>() {
        Ok(p) if p.is_finite() && (0.0..=100.0).contains(&p) => Ok(Some(p)),
        _ => Err(ClassifyError::InvalidDiscount(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn row(cells: &[&str]) -> Row {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn in_submenu() -> SyncContext {
        SyncContext::default().with_menu("m1").with_submenu("s1")
    }

    #[test]
    fn test_menu_row() {
        let result = classify(&row(&["1", "M1", "d1"]), &SyncContext::default()).unwrap();
        assert_eq!(
            result,
            Some(RowInstruction::Menu(MenuDraft {
                title: "M1".into(),
                description: "d1".into(),
            }))
        );
    }

    #[test]
    fn test_submenu_row_takes_current_menu() {
        let ctx = SyncContext::default().with_menu("m1");
        match classify(&row(&["", "1", "S1", "d2"]), &ctx).unwrap() {
            Some(RowInstruction::Submenu { menu_id, draft }) => {
                assert_eq!(menu_id, "m1");
                assert_eq!(draft.title, "S1");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_child_rows_without_parent() {
        let empty = SyncContext::default();
        assert_eq!(
            classify(&row(&["", "", "S1", "d2"]), &empty),
            Err(ClassifyError::MissingMenu)
        );
        assert_eq!(
            classify(&row(&["", "", "", "Dish", "d", "1,00"]), &empty),
            Err(ClassifyError::MissingSubmenu)
        );
    }

    #[test]
    fn test_new_menu_drops_previous_submenu() {
        let fresh = in_submenu().with_menu("m2");
        assert_eq!(fresh.current_submenu_id, None);
        assert_eq!(
            classify(&row(&["", "", "", "Dish", "d", "1,00"]), &fresh),
            Err(ClassifyError::MissingSubmenu)
        );
    }

    #[test]
    fn test_dish_row_comma_price() {
        match classify(&row(&["", "", "1", "Dish1", "d3", "10,50"]), &in_submenu()).unwrap() {
            Some(RowInstruction::Dish { submenu_id, draft }) => {
                assert_eq!(submenu_id, "s1");
                assert_eq!(draft.price.to_string(), "10.50");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_dish_row_with_discount() {
        let result = classify(&row(&["", "", "1", "Dish", "d", "20,00", "10"]), &in_submenu());
        match result.unwrap() {
            Some(RowInstruction::DishWithDiscount { discount, .. }) => assert_eq!(discount, 10.0),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_blank_discount_cell() {
        let result = classify(&row(&["", "", "1", "Dish", "d", "20,00", " "]), &in_submenu());
        assert!(matches!(result, Ok(Some(RowInstruction::Dish { .. }))));
    }

    #[test]
    fn test_bad_cells() {
        assert_eq!(
            classify(&row(&["", "", "1", "Dish", "d", "abc"]), &in_submenu()),
            Err(ClassifyError::InvalidPrice("abc".into()))
        );
        assert_eq!(
            classify(&row(&["", "", "1", "Dish", "d", "1", "120"]), &in_submenu()),
            Err(ClassifyError::InvalidDiscount("120".into()))
        );
    }

    #[test]
    fn test_other_lengths_are_ignored() {
        let ctx = in_submenu();
        assert_eq!(classify(&row(&[]), &ctx), Ok(None));
        assert_eq!(classify(&row(&["x"]), &ctx), Ok(None));
        assert_eq!(classify(&row(&["", "", "", "", ""]), &ctx), Ok(None));
        assert_eq!(classify(&row(&["1", "2", "3", "4", "5", "6", "7", "8"]), &ctx), Ok(None));
    }

    fn context_strategy() -> impl Strategy<Value = SyncContext> {
        (
            proptest::option::of("[a-f0-9]{8}"),
            proptest::option::of("[a-f0-9]{8}"),
        )
            .prop_map(|(current_menu_id, current_submenu_id)| SyncContext {
                current_menu_id,
                current_submenu_id,
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        /// Classification depends on nothing but the row and the context.
        #[test]
        fn prop_classify_is_deterministic(
            cells in proptest::collection::vec("[0-9a-z ,.%]{0,6}", 0..9),
            ctx in context_strategy(),
        ) {
            let first = classify(&cells, &ctx);
            let second = classify(&cells, &ctx.clone());
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_unsupported_lengths_yield_nothing(
            cells in proptest::collection::vec(".{0,4}", 0..12),
            ctx in context_strategy(),
        ) {
            prop_assume!(![3, 4, 6, 7].contains(&cells.len()));
            prop_assert_eq!(classify(&cells, &ctx), Ok(None));
        }
    }
}
