#[cfg(test)]
mod tests {
    use crate::client::cart::{Cart, CartProduct};
    use crate::commands::order::DeliveryAddress;
    use crate::commands::product::{page_params, total_pages};
    use crate::db::{OrderStatus, Role, Unit, User};
    use chrono::Utc;
    use uuid::Uuid;

    fn make_user(role: Role, is_approved: bool) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Test User".to_string(),
            email: format!("{}@test.local", Uuid::new_v4()),
            password_hash: "x".to_string(),
            role,
            phone: "9999999999".to_string(),
            city: "Pune".to_string(),
            address: None,
            farm_description: None,
            is_approved,
            created_at: Utc::now(),
        }
    }

    fn make_cart_product(farmer_id: Uuid, price: f64) -> CartProduct {
        CartProduct {
            id: Uuid::new_v4(),
            farmer_id,
            name: "Tomatoes".to_string(),
            price,
            unit: Unit::Kg,
            image: "tomatoes.jpg".to_string(),
        }
    }

    #[test]
    fn test_pagination_defaults_and_clamping() {
        assert_eq!(page_params(None, None), (1, 10, 0));
        assert_eq!(page_params(Some(3), Some(25)), (3, 25, 50));
        // page below 1 snaps back to the first page
        assert_eq!(page_params(Some(0), Some(10)), (1, 10, 0));
        assert_eq!(page_params(Some(-2), None), (1, 10, 0));
        // limit is bounded
        assert_eq!(page_params(Some(1), Some(1000)), (1, 100, 0));
        assert_eq!(page_params(Some(1), Some(0)), (1, 1, 0));
    }

    #[test]
    fn test_total_pages_rounds_up() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(95, 10), 10);
    }

    #[test]
    fn test_role_predicates_fail_closed() {
        let customer = make_user(Role::Customer, true);
        assert!(customer.require_customer().is_ok());
        assert!(customer.require_farmer().is_err());
        assert!(customer.require_approved_farmer().is_err());
        assert!(customer.require_admin().is_err());

        let unapproved_farmer = make_user(Role::Farmer, false);
        assert!(unapproved_farmer.require_farmer().is_ok());
        assert!(unapproved_farmer.require_approved_farmer().is_err());
        assert!(unapproved_farmer.require_customer().is_err());

        let approved_farmer = make_user(Role::Farmer, true);
        assert!(approved_farmer.require_approved_farmer().is_ok());

        let admin = make_user(Role::Admin, true);
        assert!(admin.require_admin().is_ok());
        assert!(admin.is_admin());
        // Admins do not get implicit customer or farmer powers
        assert!(admin.require_customer().is_err());
        assert!(admin.require_approved_farmer().is_err());
    }

    #[test]
    fn test_order_status_parsing() {
        assert_eq!("pending".parse::<OrderStatus>().unwrap(), OrderStatus::Pending);
        assert_eq!("confirmed".parse::<OrderStatus>().unwrap(), OrderStatus::Confirmed);
        assert_eq!("shipped".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
        assert_eq!("delivered".parse::<OrderStatus>().unwrap(), OrderStatus::Delivered);
        assert_eq!("cancelled".parse::<OrderStatus>().unwrap(), OrderStatus::Cancelled);
        assert!("refunded".parse::<OrderStatus>().is_err());
        assert!("Pending".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_token_round_trip() {
        use crate::middleware::auth::{decode_token, issue_token};

        let user_id = Uuid::new_v4();
        let token = issue_token(user_id).unwrap();
        let claims = decode_token(&token).unwrap();
        assert_eq!(claims.sub, user_id);

        assert!(decode_token("not-a-token").is_err());
    }

    #[test]
    fn test_cart_add_merges_same_product() {
        let farmer = Uuid::new_v4();
        let product = make_cart_product(farmer, 40.0);
        let mut cart = Cart::new();

        cart.add(product.clone(), 2);
        cart.add(product.clone(), 3);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity, 5);
        assert_eq!(cart.total(), 200.0);

        // non-positive quantities are ignored
        cart.add(product, 0);
        assert_eq!(cart.lines()[0].quantity, 5);
    }

    #[test]
    fn test_cart_total_is_sum_of_line_subtotals() {
        let farmer = Uuid::new_v4();
        let mut cart = Cart::new();
        cart.add(make_cart_product(farmer, 40.0), 10);
        cart.add(make_cart_product(farmer, 12.5), 4);

        let expected: f64 = cart.lines().iter().map(|l| l.subtotal()).sum();
        assert_eq!(cart.total(), expected);
        assert_eq!(cart.total(), 450.0);
    }

    #[test]
    fn test_cart_set_quantity_and_remove() {
        let farmer = Uuid::new_v4();
        let product = make_cart_product(farmer, 10.0);
        let id = product.id;
        let mut cart = Cart::new();
        cart.add(product, 2);

        cart.set_quantity(id, 7);
        assert_eq!(cart.lines()[0].quantity, 7);

        // zero quantity drops the line
        cart.set_quantity(id, 0);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_cart_single_farmer_detection() {
        let farmer_a = Uuid::new_v4();
        let farmer_b = Uuid::new_v4();
        let mut cart = Cart::new();

        assert_eq!(cart.single_farmer(), None);

        cart.add(make_cart_product(farmer_a, 5.0), 1);
        cart.add(make_cart_product(farmer_a, 8.0), 2);
        assert_eq!(cart.single_farmer(), Some(farmer_a));

        cart.add(make_cart_product(farmer_b, 3.0), 1);
        assert_eq!(cart.single_farmer(), None);
    }

    #[test]
    fn test_cart_to_order_request() {
        let farmer = Uuid::new_v4();
        let product = make_cart_product(farmer, 40.0);
        let id = product.id;
        let mut cart = Cart::new();
        cart.add(product, 3);

        let request = cart.to_order_request(
            DeliveryAddress {
                street: "12 MG Road".to_string(),
                city: "Pune".to_string(),
                state: "MH".to_string(),
                pincode: "411001".to_string(),
            },
            Some("Ring the bell".to_string()),
            None,
        );

        assert_eq!(request.products.len(), 1);
        assert_eq!(request.products[0].product_id, id);
        assert_eq!(request.products[0].quantity, 3);
        assert_eq!(request.delivery_address.city, "Pune");
    }

    #[test]
    fn test_cart_json_round_trip() {
        let farmer = Uuid::new_v4();
        let mut cart = Cart::new();
        cart.add(make_cart_product(farmer, 40.0), 2);

        let raw = cart.to_json().unwrap();
        let restored = Cart::from_json(&raw).unwrap();
        assert_eq!(restored.lines().len(), 1);
        assert_eq!(restored.total(), cart.total());
    }

    #[test]
    fn test_user_serialization_hides_password_hash() {
        let user = make_user(Role::Customer, true);
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("passwordHash").is_none());
        assert!(value.get("password_hash").is_none());
        assert_eq!(value.get("role").unwrap(), "customer");
    }
}
