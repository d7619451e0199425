use traffic_gen::error::AppResult;

fn main() -> AppResult<()> {
    traffic_gen::run()
}
