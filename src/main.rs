// src/main.rs

fn main() {
    chat_playground::run()
}
