fn main() {
    eyeguard_lib::run()
}
