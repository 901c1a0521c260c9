fn main() {
    impactsim_lib::run()
}
