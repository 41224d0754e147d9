//! Idempotent schema definition. Executed at startup and replayed by the reconnection probe
//! whenever database connectivity returns after an outage.
//!
//! `chk_balance_not_negative` is what fails the debit in `withdraw` on insufficient funds; the
//! code never checks the balance itself.

pub(crate) const CREATE_USERS: &str = r#"
CREATE TABLE IF NOT EXISTS users
(
    id bigint GENERATED ALWAYS AS IDENTITY,
    login text NOT NULL,
    password text NOT NULL,
    salt text NOT NULL,
    balance bigint NOT NULL DEFAULT 0,
    withdrawn bigint NOT NULL DEFAULT 0,
    PRIMARY KEY (id),
    CONSTRAINT uk_login UNIQUE (login),
    CONSTRAINT chk_balance_not_negative CHECK (balance >= 0),
    CONSTRAINT chk_withdrawn_not_negative CHECK (withdrawn >= 0)
)"#;

pub(crate) const CREATE_ORDERS: &str = r#"
CREATE TABLE IF NOT EXISTS orders
(
    id bigint GENERATED ALWAYS AS IDENTITY,
    order_num text NOT NULL,
    user_id bigint NOT NULL,
    status smallint NOT NULL DEFAULT 0,
    accrual bigint,
    is_final boolean NOT NULL DEFAULT false,
    uploaded_at timestamp with time zone NOT NULL DEFAULT current_timestamp,
    PRIMARY KEY (id),
    CONSTRAINT uk_order_num UNIQUE (order_num),
    CONSTRAINT fk_orders_user
        FOREIGN KEY (user_id)
        REFERENCES users (id)
)"#;

// order_num here may reference orders that were never submitted to us
pub(crate) const CREATE_WITHDRAWALS: &str = r#"
CREATE TABLE IF NOT EXISTS withdrawals
(
    id bigint GENERATED ALWAYS AS IDENTITY,
    user_id bigint NOT NULL,
    order_num text NOT NULL,
    sum bigint NOT NULL,
    processed_at timestamp with time zone NOT NULL DEFAULT current_timestamp,
    PRIMARY KEY (id),
    CONSTRAINT fk_withdrawals_user
        FOREIGN KEY (user_id)
        REFERENCES users (id)
)"#;

pub(crate) const ALL_TABLES: [&str; 3] = [CREATE_USERS, CREATE_ORDERS, CREATE_WITHDRAWALS];
