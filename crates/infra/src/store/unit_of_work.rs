use bazaar_core::VariantId;
use bazaar_inventory::{CatalogVariant, StagedStock};
use bazaar_orders::Order;

/// Staged state of one transaction.
#[derive(Debug)]
pub struct UnitOfWork {
    order: Option<Order>,
    delete_order: bool,
    stock: StagedStock,
}

impl UnitOfWork {
    pub fn new(order: Option<Order>, stock: StagedStock) -> Self {
        Self {
            order,
            delete_order: false,
            stock,
        }
    }

    /// The locked order, if the scope has one (or one has been staged).
    pub fn order(&self) -> Option<&Order> {
        self.order.as_ref()
    }

    pub fn order_mut(&mut self) -> Option<&mut Order> {
        self.order.as_mut()
    }

    /// Stage a freshly placed order for insertion.
    pub fn stage_order(&mut self, order: Order) {
        self.order = Some(order);
        self.delete_order = false;
    }

    /// Remove the locked order row on commit.
    pub fn delete_order(&mut self) {
        self.delete_order = true;
    }

    pub fn is_deleting(&self) -> bool {
        self.delete_order
    }

    pub fn stock(&self) -> &StagedStock {
        &self.stock
    }

    pub fn stock_mut(&mut self) -> &mut StagedStock {
        &mut self.stock
    }

    /// Catalog identity of a locked variant.
    pub fn catalog(&self, variant_id: VariantId) -> Option<&CatalogVariant> {
        self.stock.row(variant_id).map(|r| &r.catalog)
    }

    pub fn into_parts(self) -> (Option<Order>, bool, StagedStock) {
        (self.order, self.delete_order, self.stock)
    }
}
