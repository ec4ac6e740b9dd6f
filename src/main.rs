#[rocket::launch]
fn rocket() -> _ {
    metorik_helper::rocket()
}
